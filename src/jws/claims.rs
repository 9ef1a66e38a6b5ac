//! Flat JWT claim sets and compact token assembly.

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	jws::{JwsError, Signer, Verifier, decode_segment, encode_segment, split_compact},
};

const RESERVED_STRING_CLAIMS: [&str; 4] = ["iss", "aud", "jti", "sub"];
const RESERVED_NUMERIC_CLAIMS: [&str; 3] = ["exp", "iat", "nbf"];

/// Payload of a JWT; reserved claims plus arbitrary private claims serialized as one object.
///
/// Default values (empty strings, zero timestamps) are omitted on serialization. A private
/// claim named after a reserved claim is never emitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimSet {
	/// `iss`: who issued the token.
	pub issuer: String,
	/// `aud`: intended recipient.
	pub audience: String,
	/// `exp`: expiration, seconds since the Unix epoch.
	pub expires_at: i64,
	/// `iat`: issue time, seconds since the Unix epoch.
	pub issued_at: i64,
	/// `nbf`: not valid before, seconds since the Unix epoch.
	pub not_before: i64,
	/// `jti`: token identifier.
	pub id: String,
	/// `sub`: principal the token is about.
	pub subject: String,
	/// Non-reserved claims.
	pub private_claims: JsonMap<String, JsonValue>,
}
impl ClaimSet {
	/// Creates a claim set for the issuer/audience pair.
	pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self { issuer: issuer.into(), audience: audience.into(), ..Default::default() }
	}

	/// Sets the subject.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();

		self
	}

	/// Adds a private claim.
	pub fn with_private_claim(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.private_claims.insert(name.into(), value.into());

		self
	}

	/// Sets `iat` to now minus `start_offset` and `exp` to `iat + duration`.
	///
	/// Leaves the claim set untouched and fails unless the expiration lands strictly after the
	/// issue time.
	pub fn set_expiration_claims(
		&mut self,
		start_offset: Duration,
		duration: Duration,
	) -> Result<(), JwsError> {
		let issued_at = OffsetDateTime::now_utc()
			.unix_timestamp()
			.checked_sub(start_offset.whole_seconds())
			.ok_or(JwsError::InvalidExpiration)?;
		let expires_at = issued_at
			.checked_add(duration.whole_seconds())
			.filter(|expires_at| *expires_at > issued_at)
			.ok_or(JwsError::InvalidExpiration)?;

		self.issued_at = issued_at;
		self.expires_at = expires_at;

		Ok(())
	}

	/// `exp` as a timestamp, when set.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		if self.expires_at == 0 {
			return None;
		}

		OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
	}

	/// Signs the claim set into a compact `header.payload.signature` token.
	pub fn jwt(&self, signer: &dyn Signer) -> Result<String, JwsError> {
		let payload = encode_segment(&serde_json::to_vec(self)?);
		let content = format!("{}.{payload}", signer.header());
		let signature = signer.sign(content.as_bytes())?;

		Ok(format!("{content}.{}", encode_segment(&signature)))
	}

	/// Decodes the payload of a compact token without checking its signature.
	pub fn decode(token: &str) -> Result<Self, JwsError> {
		let [_, payload, _] = split_compact(token)?;

		Ok(serde_json::from_slice(&decode_segment(payload)?)?)
	}

	/// Verifies the signature over `header.payload`, then decodes the payload.
	pub fn decode_verified(token: &str, verifier: &dyn Verifier) -> Result<Self, JwsError> {
		let [header, payload, signature] = split_compact(token)?;
		let content = &token[..header.len() + 1 + payload.len()];

		verifier.verify(&decode_segment(signature)?, content.as_bytes())?;

		Ok(serde_json::from_slice(&decode_segment(payload)?)?)
	}

	fn to_map(&self) -> JsonMap<String, JsonValue> {
		let mut map = self
			.private_claims
			.iter()
			.filter(|(name, _)| !is_reserved(name))
			.map(|(name, value)| (name.clone(), value.clone()))
			.collect::<JsonMap<_, _>>();

		for (name, value) in [
			("iss", &self.issuer),
			("aud", &self.audience),
			("jti", &self.id),
			("sub", &self.subject),
		] {
			if !value.is_empty() {
				map.insert(name.into(), JsonValue::String(value.clone()));
			}
		}
		for (name, value) in
			[("exp", self.expires_at), ("iat", self.issued_at), ("nbf", self.not_before)]
		{
			if value != 0 {
				map.insert(name.into(), JsonValue::from(value));
			}
		}

		map
	}

	fn from_map(map: JsonMap<String, JsonValue>) -> Self {
		let mut claims = Self::default();

		for (name, value) in map {
			match (name.as_str(), value) {
				("iss", JsonValue::String(v)) => claims.issuer = v,
				("aud", JsonValue::String(v)) => claims.audience = v,
				("jti", JsonValue::String(v)) => claims.id = v,
				("sub", JsonValue::String(v)) => claims.subject = v,
				("exp", JsonValue::Number(v)) => claims.expires_at = numeric_claim(&v),
				("iat", JsonValue::Number(v)) => claims.issued_at = numeric_claim(&v),
				("nbf", JsonValue::Number(v)) => claims.not_before = numeric_claim(&v),
				(_, value) => {
					claims.private_claims.insert(name, value);
				},
			}
		}

		claims
	}
}
impl Serialize for ClaimSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.to_map().serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for ClaimSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		JsonMap::deserialize(deserializer).map(Self::from_map)
	}
}

fn is_reserved(name: &str) -> bool {
	RESERVED_STRING_CLAIMS.contains(&name) || RESERVED_NUMERIC_CLAIMS.contains(&name)
}

fn numeric_claim(value: &serde_json::Number) -> i64 {
	value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::jws::{Algorithm, HmacSigner};

	#[test]
	fn reserved_claims_win_over_private_claims() {
		let claims = ClaimSet::new("real-issuer", "aud")
			.with_private_claim("iss", "impostor")
			.with_private_claim("scope", "signature");
		let json = serde_json::to_value(&claims).expect("Claim set should serialize.");

		assert_eq!(json["iss"], "real-issuer");
		assert_eq!(json["scope"], "signature");
	}

	#[test]
	fn reserved_private_claim_without_reserved_value_is_dropped() {
		let claims = ClaimSet::default().with_private_claim("sub", "impostor");
		let json = serde_json::to_value(&claims).expect("Claim set should serialize.");

		assert_eq!(json, serde_json::json!({}));
	}

	#[test]
	fn deserialization_routes_by_value_type() {
		let claims: ClaimSet = serde_json::from_value(serde_json::json!({
			"iss": "issuer",
			"aud": ["not", "a", "string"],
			"exp": 1700000000,
			"iat": "not a number",
			"nbf": 1.5e9,
			"name": "Ada"
		}))
		.expect("Claim set should deserialize.");

		assert_eq!(claims.issuer, "issuer");
		assert_eq!(claims.audience, "");
		assert_eq!(claims.expires_at, 1_700_000_000);
		assert_eq!(claims.issued_at, 0);
		assert_eq!(claims.not_before, 1_500_000_000);
		assert_eq!(claims.private_claims["aud"], serde_json::json!(["not", "a", "string"]));
		assert_eq!(claims.private_claims["iat"], "not a number");
		assert_eq!(claims.private_claims["name"], "Ada");
	}

	#[test]
	fn expiration_must_follow_issue_time() {
		let mut claims = ClaimSet::new("issuer", "aud");

		assert!(matches!(
			claims.set_expiration_claims(Duration::seconds(10), Duration::ZERO),
			Err(JwsError::InvalidExpiration)
		));
		assert_eq!(claims.issued_at, 0);

		claims
			.set_expiration_claims(Duration::seconds(10), Duration::hours(1))
			.expect("Positive duration should be accepted.");

		assert_eq!(claims.expires_at - claims.issued_at, 3600);
		assert!(claims.issued_at <= OffsetDateTime::now_utc().unix_timestamp() - 10);
		assert!(matches!(
			claims.set_expiration_claims(Duration::seconds(10), Duration::MAX),
			Err(JwsError::InvalidExpiration)
		));
	}

	#[test]
	fn hmac_token_round_trips_through_verification() {
		let signer = HmacSigner::new(Algorithm::Hs256, b"secret".to_vec(), Some("kid-7"))
			.expect("HMAC signer should build.");
		let mut claims = ClaimSet::new("issuer", "account-d.docusign.com")
			.with_subject("user-0001")
			.with_private_claim("scope", "signature impersonation");

		claims
			.set_expiration_claims(Duration::seconds(10), Duration::hours(1))
			.expect("Expiration should be valid.");

		let token = claims.jwt(&signer).expect("Claim set should sign.");
		let decoded = ClaimSet::decode_verified(&token, &signer.verifier())
			.expect("Signed token should verify.");

		assert_eq!(decoded, claims);
		assert_eq!(ClaimSet::decode(&token).expect("Token should decode."), claims);

		let tampered = format!("{token}x");

		assert!(ClaimSet::decode_verified(&tampered, &signer.verifier()).is_err());
	}

	#[test]
	fn expiry_is_absent_when_unset() {
		assert_eq!(ClaimSet::default().expiry(), None);

		let claims = ClaimSet { expires_at: 1_700_000_000, ..Default::default() };

		assert_eq!(claims.expiry().map(OffsetDateTime::unix_timestamp), Some(1_700_000_000));
	}
}
