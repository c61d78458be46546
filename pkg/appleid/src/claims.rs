//! Decoding and validation of identity token claims.
//!
//! Checks run in a fixed order and the first violation is returned:
//! issuer, audience, expiry, not-before, issued-at and, when requested,
//! the nonce. The same leeway widens all three time checks, since Apple
//! may hand out the same identity token for up to a day.
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::APPLE_ISSUER;
use crate::error::{ClaimsDecodeError, ClaimsError};
use crate::models::Claims;
use crate::token::{Segments, decode_segment};
use crate::verifier::VerifyOptions;

/// What a claim set must satisfy to be accepted.
#[derive(Debug, Clone, Copy)]
pub struct ClaimsPolicy<'a> {
    /// Expected `iss`.
    pub issuer: &'a str,

    /// Expected `aud`, the client id of the relying party.
    pub audience: &'a str,

    /// Tolerance applied to `exp`, `nbf` and `iat`.
    pub leeway: Duration,

    /// Expected `nonce`, if the caller knows it.
    pub nonce: Option<&'a str>,
}

impl<'a> From<&'a VerifyOptions> for ClaimsPolicy<'a> {
    fn from(options: &'a VerifyOptions) -> Self {
        Self {
            issuer: APPLE_ISSUER,
            audience: &options.client_id,
            leeway: options.leeway,
            nonce: options.expected_nonce.as_deref(),
        }
    }
}

/// Decodes the payload segment of a token.
///
/// # Errors
/// - token does not have three segments
/// - payload is not base64url
/// - payload is not a claim set with `iss`, `sub` and `aud`
pub fn decode(token: &str) -> Result<Claims, ClaimsDecodeError> {
    let segments = Segments::split(token).ok_or(ClaimsDecodeError::MalformedToken)?;
    let payload = decode_segment(segments.payload)?;
    let claims = serde_json::from_slice(&payload)?;
    Ok(claims)
}

/// Validates decoded claims against a policy at the instant `now`.
///
/// # Errors
/// - the first violated check, see the module documentation
pub fn validate(
    claims: &Claims,
    policy: &ClaimsPolicy<'_>,
    now: DateTime<Utc>,
) -> Result<(), ClaimsError> {
    if claims.issuer != policy.issuer {
        return Err(ClaimsError::BadIssuer(claims.issuer.clone()));
    }

    if claims.audience != policy.audience {
        return Err(ClaimsError::BadAudience(claims.audience.clone()));
    }

    let now = now.timestamp();
    let leeway = i64::try_from(policy.leeway.as_secs()).unwrap_or(i64::MAX);

    if let Some(expires_at) = claims.expires_at
        && expires_at.saturating_add(leeway) < now
    {
        return Err(ClaimsError::Expired);
    }

    if let Some(not_before) = claims.not_before
        && not_before.saturating_sub(leeway) > now
    {
        return Err(ClaimsError::NotYetValid);
    }

    if let Some(issued_at) = claims.issued_at
        && issued_at.saturating_sub(leeway) > now
    {
        return Err(ClaimsError::IssuedInFuture);
    }

    if let Some(expected) = policy.nonce
        && claims.nonce.as_deref() != Some(expected)
    {
        return Err(ClaimsError::NonceMismatch);
    }

    Ok(())
}
