//! Compact JWS parsing and RS256 signature verification.
//!
//! A token is `BASE64URL(header) . BASE64URL(payload) . BASE64URL(signature)`,
//! where the signature covers the first two segments as they appear in the
//! token.
use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use tracing::debug;

use crate::key::PublicKey;

const SUPPORTED_ALGORITHM: &str = "RS256";

/// The three segments of a compact token.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segments<'a> {
    pub(crate) header: &'a str,
    pub(crate) payload: &'a str,
    pub(crate) signature: &'a str,
}

impl<'a> Segments<'a> {
    /// Splits a token into its segments, `None` unless there are exactly three.
    pub(crate) fn split(token: &'a str) -> Option<Self> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Some(Self {
                header,
                payload,
                signature,
            }),
            _ => None,
        }
    }

    /// The bytes the signature is computed over.
    fn signing_input(&self, token: &'a str) -> &'a str {
        &token[..self.header.len() + 1 + self.payload.len()]
    }
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum TokenFormatError {
    #[error("token is not made of three segments")]
    SegmentCount,

    #[error("segment is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid header: {0}")]
    Header(#[from] serde_json::Error),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature check failed: {0}")]
    Signature(#[from] jsonwebtoken::errors::Error),
}

pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(segment)
}

/// Returns the `kid` of the token header, if the header can be read.
///
/// Used for key selection only; nothing read here is trusted before the
/// signature is verified.
pub(crate) fn key_id(token: &str) -> Option<String> {
    let segments = Segments::split(token)?;
    let header = decode_segment(segments.header).ok()?;
    serde_json::from_slice::<TokenHeader>(&header).ok()?.kid
}

/// Verifies the structure and RS256 signature of a token.
///
/// Returns `false` for any malformed token, an algorithm other than RS256
/// or a signature that does not match the key.
#[must_use]
pub fn verify(token: &str, key: &PublicKey) -> bool {
    match check_signature(token, key) {
        Ok(valid) => valid,
        Err(err) => {
            debug!(error = %err, "rejecting malformed token");
            false
        }
    }
}

fn check_signature(token: &str, key: &PublicKey) -> Result<bool, TokenFormatError> {
    let segments = Segments::split(token).ok_or(TokenFormatError::SegmentCount)?;

    let header = decode_segment(segments.header)?;
    decode_segment(segments.payload)?;
    decode_segment(segments.signature)?;

    let header: TokenHeader = serde_json::from_slice(&header)?;
    if header.alg != SUPPORTED_ALGORITHM {
        return Err(TokenFormatError::UnsupportedAlgorithm(header.alg));
    }

    let valid = jsonwebtoken::crypto::verify(
        segments.signature,
        segments.signing_input(token).as_bytes(),
        key.decoding_key(),
        Algorithm::RS256,
    )?;
    Ok(valid)
}
