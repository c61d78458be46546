//! Keys, claims and tokens shared by the unit tests.
//!
//! Tokens are signed with the RSA keys under `testdata/`, whose public
//! halves are published in `keys.json` and `rotated_keys.json`.
use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use crate::APPLE_ISSUER;
use crate::clock::mock::MOCK_TIMESTAMP;
use crate::key::{PublicKey, convert};
use crate::models::{AccountDetails, Claims, KeyRecord, KeySet};
use crate::token::Segments;

pub(crate) const PRIMARY_KID: &str = "W6WcOKB";
pub(crate) const ROTATED_KID: &str = "fh6Bs8C";
pub(crate) const CLIENT_ID: &str = "com.example.app";
pub(crate) const SUBJECT: &str = "001234.5e7c0a1b9d8f4e2c.0420";

pub(crate) const KEYS_JSON: &str = include_str!("../testdata/keys.json");
const ROTATED_KEYS_JSON: &str = include_str!("../testdata/rotated_keys.json");
const PRIMARY_PEM: &[u8] = include_bytes!("../testdata/primary.pem");
const ROTATED_PEM: &[u8] = include_bytes!("../testdata/rotated.pem");

/// Private keys the tests sign with.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SigningKey {
    /// Published in both key sets.
    Primary,
    /// Published only in the rotated key set.
    Rotated,
}

impl SigningKey {
    fn pem(self) -> &'static [u8] {
        match self {
            Self::Primary => PRIMARY_PEM,
            Self::Rotated => ROTATED_PEM,
        }
    }

    fn kid(self) -> &'static str {
        match self {
            Self::Primary => PRIMARY_KID,
            Self::Rotated => ROTATED_KID,
        }
    }
}

pub(crate) fn fixture_key_set() -> KeySet {
    serde_json::from_str(KEYS_JSON).unwrap()
}

pub(crate) fn fixture_rotated_key_set() -> KeySet {
    serde_json::from_str(ROTATED_KEYS_JSON).unwrap()
}

pub(crate) fn fixture_key_record<F>(mut func: F) -> KeyRecord
where
    F: FnMut(&mut KeyRecord),
{
    let mut record = fixture_key_set().keys.remove(0);
    func(&mut record);
    record
}

pub(crate) fn fixture_public_key() -> PublicKey {
    convert(&fixture_key_record(|_| {})).unwrap()
}

pub(crate) fn fixture_claims<F>(mut func: F) -> Claims
where
    F: FnMut(&mut Claims),
{
    let mut claims = Claims {
        issuer: APPLE_ISSUER.to_string(),
        subject: SUBJECT.to_string(),
        audience: CLIENT_ID.to_string(),
        expires_at: Some(MOCK_TIMESTAMP + 600),
        issued_at: Some(MOCK_TIMESTAMP - 60),
        not_before: None,
        nonce: None,
        email: Some("chris@cprince.com".to_string()),
        email_verified: Some("true".to_string()),
        is_private_email: None,
    };
    func(&mut claims);
    claims
}

pub(crate) fn fixture_account_details<F>(mut func: F) -> AccountDetails
where
    F: FnMut(&mut AccountDetails),
{
    let mut details = AccountDetails {
        first_name: Some("Christopher".to_string()),
        last_name: Some("Prince".to_string()),
        full_name: Some("Christopher Prince".to_string()),
        email: Some("chris@cprince.com".to_string()),
    };
    func(&mut details);
    details
}

/// Signs claims with RS256, putting the key's `kid` in the header.
pub(crate) fn sign_token(claims: &Claims, key: SigningKey) -> String {
    sign_payload(claims, key)
}

/// Signs an arbitrary payload, e.g. one that is not a valid claim set.
pub(crate) fn sign_payload<T: serde::Serialize>(payload: &T, key: SigningKey) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid().to_string());
    let encoding_key = EncodingKey::from_rsa_pem(key.pem()).unwrap();
    jsonwebtoken::encode(&header, payload, &encoding_key).unwrap()
}

/// A token over [`fixture_claims`] signed with the primary key.
pub(crate) fn fixture_token<F>(func: F) -> String
where
    F: FnMut(&mut Claims),
{
    sign_token(&fixture_claims(func), SigningKey::Primary)
}

/// Replaces the header segment, keeping payload and signature.
pub(crate) fn tamper_header(token: &str, raw_header: &str) -> String {
    let segments = Segments::split(token).unwrap();
    format!(
        "{}.{}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(raw_header),
        segments.payload,
        segments.signature
    )
}

/// Replaces the payload segment, keeping header and signature.
pub(crate) fn tamper_payload_raw(token: &str, raw_payload: &str) -> String {
    let segments = Segments::split(token).unwrap();
    format!(
        "{}.{}.{}",
        segments.header,
        BASE64_URL_SAFE_NO_PAD.encode(raw_payload),
        segments.signature
    )
}

/// Edits the claims of a signed token without re-signing it.
pub(crate) fn tamper_payload<F>(token: &str, mut func: F) -> String
where
    F: FnMut(&mut Claims),
{
    let mut claims = crate::claims::decode(token).unwrap();
    func(&mut claims);
    tamper_payload_raw(token, &serde_json::to_string(&claims).unwrap())
}
