use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The set of public keys Apple currently signs identity tokens with.
///
/// <https://developer.apple.com/documentation/sign_in_with_apple/fetch_apple_s_public_key_for_verifying_token_signature>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySet {
    /// The published keys, in the order Apple lists them.
    pub keys: Vec<KeyRecord>,
}

/// A single JSON Web Key as published by Apple.
///
/// The modulus and exponent are optional on the wire so that a record
/// lacking them fails key conversion instead of the whole key set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyRecord {
    /// Key type, `RSA` for every key Apple publishes.
    #[serde(rename = "kty")]
    pub key_type: String,

    /// Key ID, matched against the `kid` of the token header.
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Intended use of the key, `sig`.
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Signing algorithm, `RS256`.
    #[serde(rename = "alg", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,

    /// RSA modulus (base64url).
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<String>,
}

/// Claims of a Sign in with Apple identity token.
///
/// See <https://developer.apple.com/documentation/sign_in_with_apple/sign_in_with_apple_rest_api/authenticating_users_with_sign_in_with_apple>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    /// Issuer, `https://appleid.apple.com`.
    #[serde(rename = "iss")]
    pub issuer: String,

    /// Stable unique identifier of the user.
    #[serde(rename = "sub")]
    pub subject: String,

    /// The client_id of the relying party.
    #[serde(rename = "aud")]
    pub audience: String,

    /// Expiration time (UNIX timestamp).
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// Issued-at time (UNIX timestamp).
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    /// Not-before time (UNIX timestamp).
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,

    /// Present only if a nonce was passed in the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// The user's email address, possibly a private relay address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether Apple verified the email. Sent as `"true"` or `true`.
    #[serde(
        default,
        deserialize_with = "bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email_verified: Option<String>,

    /// Whether the email is a private relay address.
    #[serde(
        default,
        deserialize_with = "bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_private_email: Option<String>,
}

impl Claims {
    /// Returns the expiration time as a datetime.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
    }
}

/// Apple has sent boolean claims both as JSON booleans and as strings.
fn bool_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    let value = Option::<BoolOrString>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        BoolOrString::Bool(value) => value.to_string(),
        BoolOrString::String(value) => value,
    }))
}

/// Profile attributes a client may send along with the identity token.
///
/// The identity token does not contain the user's name; Apple only hands
/// it to the app on the first sign in. The app can forward it as JSON in
/// the `X-account-details` header. None of it is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The canonical identity of a user that passed verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// The token subject.
    pub id: String,

    pub display_name: String,

    pub name: IdentityName,

    pub emails: Vec<String>,

    /// Tag of the authentication method, see [`crate::PROVIDER`].
    pub provider: String,

    /// Expiration of the identity token the record was created from.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Name parts of an [`IdentityRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityName {
    pub family_name: String,
    pub given_name: String,
}
