use appleid::{APPLE_ISSUER, Claims};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const CLIENT_ID: &str = "com.example.app";
pub(crate) const PRIMARY_KID: &str = "W6WcOKB";
pub(crate) const ROTATED_KID: &str = "fh6Bs8C";
pub(crate) const KEYS_PATH: &str = "/auth/keys";

const KEYS_JSON: &str = include_str!("../../testdata/keys.json");
const PRIMARY_PEM: &[u8] = include_bytes!("../../testdata/primary.pem");
const ROTATED_PEM: &[u8] = include_bytes!("../../testdata/rotated.pem");

/// Starts a server publishing the primary test key.
pub(crate) async fn start_key_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(KEYS_JSON))
        .mount(&server)
        .await;
    server
}

pub(crate) fn keys_endpoint(server: &MockServer) -> String {
    format!("{}{KEYS_PATH}", server.uri())
}

/// Claims valid for the next ten minutes.
pub(crate) fn fresh_claims(subject: &str) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        issuer: APPLE_ISSUER.to_string(),
        subject: subject.to_string(),
        audience: CLIENT_ID.to_string(),
        expires_at: Some(now + 600),
        issued_at: Some(now),
        not_before: None,
        nonce: None,
        email: Some("chris@cprince.com".to_string()),
        email_verified: Some("true".to_string()),
        is_private_email: None,
    }
}

pub(crate) fn sign(claims: &Claims, kid: &str) -> String {
    let pem = if kid == ROTATED_KID { ROTATED_PEM } else { PRIMARY_PEM };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}
