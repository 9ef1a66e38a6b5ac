//! Compact JSON Web Signatures used to build JWT-bearer assertions.
//!
//! `signer` exposes the [`Signer`]/[`Verifier`] capabilities with one implementation per
//! algorithm family (RSA PKCS#1 v1.5 and HMAC, each with SHA-256/384/512). `claims` models
//! the flat claim set and assembles or decodes `header.payload.signature` tokens.

pub mod claims;
pub mod signer;

pub use claims::*;
pub use signer::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Key, signing, and compact-token failures.
#[derive(Debug, ThisError)]
pub enum JwsError {
	/// Key bytes are neither PEM nor DER PKCS#1/PKCS#8.
	#[error("Private key is not a PEM or DER encoded PKCS#1/PKCS#8 key.")]
	KeyDecode,
	/// Key decoded, but it is not an RSA key.
	#[error("Private key is not an RSA key (algorithm {oid}).")]
	NotRsaKey {
		/// Algorithm OID found in the key.
		oid: String,
	},
	/// Public key bytes could not be decoded.
	#[error("Public key is not a PEM encoded SPKI or PKCS#1 RSA key.")]
	PublicKeyDecode,
	/// Signer or verifier constructed with an algorithm from the wrong family.
	#[error("Algorithm {algorithm} cannot be used with a {family} key.")]
	AlgorithmMismatch {
		/// Requested algorithm.
		algorithm: Algorithm,
		/// Key family that was supplied.
		family: &'static str,
	},
	/// Underlying RSA primitive failed.
	#[error("RSA signing failed.")]
	Sign(#[source] rsa::signature::Error),
	/// Signature does not match the content.
	#[error("Signature verification failed.")]
	Verification,
	/// Compact token does not have exactly three sections.
	#[error("Invalid token: expected 3 sections, found {sections}.")]
	InvalidToken {
		/// Number of `.`-separated sections found.
		sections: usize,
	},
	/// A token section is not valid base64url.
	#[error("Token section is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// A claim set or header could not be (de)serialized.
	#[error("Token JSON is malformed.")]
	Json(#[from] serde_json::Error),
	/// Expiration would not be strictly after the issued-at instant.
	#[error("Expiration time must be after issued-at time.")]
	InvalidExpiration,
}

/// Header section of a compact token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
	/// Signing algorithm name.
	pub alg: String,
	/// Token type; `JWT` for tokens produced by this crate.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub typ: Option<String>,
	/// Key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
}
impl JwsHeader {
	/// Creates a `JWT` header for the algorithm and optional key id.
	pub fn new(algorithm: Algorithm, kid: Option<&str>) -> Self {
		Self { alg: algorithm.as_str().into(), typ: Some("JWT".into()), kid: kid.map(Into::into) }
	}

	/// base64url (no padding) JSON encoding.
	pub fn encode(&self) -> Result<String, JwsError> {
		Ok(encode_segment(&serde_json::to_vec(self)?))
	}

	/// Reads the header section of a compact token without verifying it.
	pub fn decode(token: &str) -> Result<Self, JwsError> {
		let [header, _, _] = split_compact(token)?;

		Ok(serde_json::from_slice(&decode_segment(header)?)?)
	}
}

pub(crate) fn encode_segment(bytes: &[u8]) -> String {
	URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, JwsError> {
	Ok(URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?)
}

/// Splits `header.payload.signature`; any other section count is an invalid token.
pub(crate) fn split_compact(token: &str) -> Result<[&str; 3], JwsError> {
	let parts = token.split('.').collect::<Vec<_>>();

	match parts.as_slice() {
		[header, payload, signature] => Ok([*header, *payload, *signature]),
		_ => Err(JwsError::InvalidToken { sections: parts.len() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn split_requires_exactly_three_sections() {
		assert!(split_compact("a.b.c").is_ok());
		assert!(matches!(split_compact("a.b"), Err(JwsError::InvalidToken { sections: 2 })));
		assert!(matches!(split_compact("a.b.c.d"), Err(JwsError::InvalidToken { sections: 4 })));
		assert!(matches!(split_compact(""), Err(JwsError::InvalidToken { sections: 1 })));
	}

	#[test]
	fn header_encoding_is_compact_json() {
		let header = JwsHeader::new(Algorithm::Hs256, Some("kid-1"));
		let encoded = header.encode().expect("Header should encode.");
		let decoded = decode_segment(&encoded).expect("Header should decode.");

		assert_eq!(decoded, br#"{"alg":"HS256","typ":"JWT","kid":"kid-1"}"#);
	}
}
