//! User-info records and account resolution.

// self
use crate::_prelude::*;

/// Identity and accounts returned by the user-info endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// API username (the `sub` claim); used as the subject of JWT-bearer grants.
	#[serde(rename = "sub")]
	pub api_username: String,
	/// Full name.
	#[serde(default)]
	pub name: String,
	/// Given name.
	#[serde(default)]
	pub given_name: String,
	/// Family name.
	#[serde(default)]
	pub family_name: String,
	/// Email address.
	#[serde(default)]
	pub email: String,
	/// Accounts the user may act on.
	#[serde(default)]
	pub accounts: Vec<Account>,
}
impl UserInfo {
	/// Finds the account to bind to.
	///
	/// An empty `account_id` selects the first account flagged as default; otherwise the first
	/// exact match wins.
	pub fn resolve_account(&self, account_id: &str) -> Result<&Account> {
		self.accounts
			.iter()
			.find(|account| {
				if account_id.is_empty() {
					account.is_default
				} else {
					account.account_id == account_id
				}
			})
			.ok_or_else(|| Error::AccountNotFound {
				account_id: account_id.to_owned(),
				email: self.email.clone(),
			})
	}
}

/// Account the user can access, with its API routing host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	/// Account identifier used in API paths.
	pub account_id: String,
	/// Whether this is the user's default account.
	#[serde(default)]
	pub is_default: bool,
	/// Display name.
	#[serde(default)]
	pub account_name: String,
	/// Origin API calls for this account are routed to.
	pub base_uri: String,
	/// Owning organization, when the account belongs to one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub organization: Option<Organization>,
}

/// Organization an account belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
	/// Organization identifier.
	pub organization_id: String,
	/// Related links.
	#[serde(default)]
	pub links: Vec<OrganizationLink>,
}

/// Link attached to an [`Organization`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationLink {
	/// Relation name.
	pub rel: String,
	/// Target URL.
	pub href: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn user() -> UserInfo {
		serde_json::from_value(serde_json::json!({
			"sub": "user-0001",
			"name": "Ada Signer",
			"given_name": "Ada",
			"family_name": "Signer",
			"email": "ada@example.com",
			"accounts": [
				{
					"account_id": "acct-1",
					"is_default": false,
					"account_name": "First",
					"base_uri": "https://na1.example.net"
				},
				{
					"account_id": "acct-2",
					"is_default": true,
					"account_name": "Second",
					"base_uri": "https://na2.example.net",
					"organization": {
						"organization_id": "org-1",
						"links": [{"rel": "self", "href": "https://example.net/org-1"}]
					}
				}
			]
		}))
		.expect("User info fixture should deserialize.")
	}

	#[test]
	fn empty_id_selects_default_account() {
		let user = user();
		let account = user.resolve_account("").expect("Default account should resolve.");

		assert_eq!(account.account_id, "acct-2");
		assert_eq!(
			account.organization.as_ref().map(|org| org.organization_id.as_str()),
			Some("org-1")
		);
	}

	#[test]
	fn explicit_id_selects_exact_match() {
		let user = user();

		assert_eq!(
			user.resolve_account("acct-1").expect("Account should resolve.").base_uri,
			"https://na1.example.net"
		);
	}

	#[test]
	fn unknown_id_reports_account_and_email() {
		let err = user().resolve_account("acct-9").expect_err("Unknown account should fail.");

		assert!(matches!(
			err,
			Error::AccountNotFound { ref account_id, ref email }
				if account_id == "acct-9" && email == "ada@example.com"
		));
	}

	#[test]
	fn missing_default_is_an_error() {
		let mut user = user();

		user.accounts.iter_mut().for_each(|account| account.is_default = false);

		assert!(matches!(user.resolve_account(""), Err(Error::AccountNotFound { .. })));
	}
}
