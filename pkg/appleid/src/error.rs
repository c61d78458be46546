/// Errors fetching Apple's public key set.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("failed to build http client")]
    BuildHttpClient,

    #[error("parse URL: {0}")]
    ParseURL(#[from] url::ParseError),

    #[error("key endpoint must use https: {0}")]
    InsecureEndpoint(url::Url),

    #[error("failed to send request: {0}")]
    SendRequest(#[source] reqwest::Error),

    #[error("key set request timed out")]
    Timeout,

    #[error("unexpected HTTP status code: {0}")]
    UnexpectedStatusCode(reqwest::StatusCode),

    #[error("failed to read response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("failed to decode key set: {0}")]
    DecodeBody(#[from] serde_json::Error),

    #[error("no keys available")]
    NoKeysAvailable,
}

impl FetchError {
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::SendRequest(err)
        }
    }
}

/// Errors converting a published key into an RSA public key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConversionError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("missing key component: {0}")]
    MissingComponent(&'static str),

    #[error("malformed key component {component}: {source}")]
    MalformedComponent {
        component: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("unsupported modulus length: {0} bits")]
    ModulusLength(usize),

    #[error("invalid public exponent")]
    InvalidExponent,
}

/// Errors decoding the payload segment of a token.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClaimsDecodeError {
    #[error("token is not made of three segments")]
    MalformedToken,

    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid claims: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded claim set that violates the verification policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ClaimsError {
    #[error("unexpected issuer: {0}")]
    BadIssuer(String),

    #[error("unexpected audience: {0}")]
    BadAudience(String),

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token issued in the future")]
    IssuedInFuture,

    #[error("nonce mismatch")]
    NonceMismatch,
}

/// Why an identity token was rejected.
///
/// Callers should answer every variant with the same "authentication
/// failed"; the variant is meant for logs.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerificationError {
    #[error("failed to fetch key set: {0}")]
    KeyFetchFailed(#[from] FetchError),

    #[error("failed to convert public key: {0}")]
    KeyConversionFailed(#[from] ConversionError),

    #[error("invalid token signature")]
    SignatureInvalid,

    #[error("failed to decode claims: {0}")]
    ClaimsDecodeFailed(#[from] ClaimsDecodeError),

    #[error("bad issuer: {0}")]
    BadIssuer(String),

    #[error("bad audience: {0}")]
    BadAudience(String),

    #[error("invalid claims: {0}")]
    ClaimsInvalid(ClaimsError),
}

impl From<ClaimsError> for VerificationError {
    fn from(err: ClaimsError) -> Self {
        match err {
            ClaimsError::BadIssuer(issuer) => Self::BadIssuer(issuer),
            ClaimsError::BadAudience(audience) => Self::BadAudience(audience),
            other => Self::ClaimsInvalid(other),
        }
    }
}
