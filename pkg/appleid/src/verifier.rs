//! Verification of Sign in with Apple identity tokens.
//!
//! A token is accepted if, in this order:
//! - the current key set can be fetched and is not empty
//! - the key selected for the token converts to an RSA public key
//! - the token carries a valid RS256 signature by that key
//! - its claims decode and satisfy the [`ClaimsPolicy`]
//!
//! The first failing step decides the outcome.
//!
//! Callers are expected to have checked that the request announced an
//! Apple token, i.e. its `X-token-type` header equals [`crate::PROVIDER`];
//! the verifier itself never sees that header.
//!
//! # Further readings
//! <https://developer.apple.com/documentation/sign_in_with_apple/sign_in_with_apple_rest_api/verifying_a_user>
use std::marker::PhantomData;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::claims::{self, ClaimsPolicy};
use crate::clock::{Now, SystemNow};
use crate::error::{FetchError, VerificationError};
use crate::fetch::KeySetFetcher;
use crate::key::{convert, select_key};
use crate::models::Claims;
use crate::token;

/// The result of verifying one token.
pub type VerificationOutcome = Result<Claims, VerificationError>;

/// Per-verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Expected `aud`, the services or bundle id of the app.
    pub client_id: String,

    /// Tolerance for `exp`, `nbf` and `iat`.
    pub leeway: Duration,

    /// Upper bound for fetching the key set.
    pub timeout: Option<Duration>,

    /// Nonce the token must carry, if any.
    pub expected_nonce: Option<String>,
}

impl VerifyOptions {
    /// Options without leeway, timeout or nonce.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            leeway: Duration::ZERO,
            timeout: None,
            expected_nonce: None,
        }
    }

    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_expected_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.expected_nonce = Some(nonce.into());
        self
    }
}

/// Verifies identity tokens against the keys of a [`KeySetFetcher`].
///
/// Holds no state between verifications and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct Verifier<F, N = SystemNow> {
    pub(crate) fetcher: F,
    pub(crate) _now: PhantomData<N>,
}

impl<F> Verifier<F, SystemNow> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            _now: PhantomData,
        }
    }
}

impl<F, N> Verifier<F, N>
where
    F: KeySetFetcher,
    N: Now,
{
    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    /// - key set cannot be fetched in time or is empty
    /// - selected key cannot be converted
    /// - signature is invalid
    /// - claims cannot be decoded or violate the policy
    #[instrument(skip_all, fields(client_id = %options.client_id))]
    pub async fn verify_token(&self, token: &str, options: &VerifyOptions) -> VerificationOutcome {
        let result = self.verify(token, options).await;

        match &result {
            Ok(claims) => info!(subject = %claims.subject, "identity token verified"),
            Err(err @ VerificationError::KeyConversionFailed(_)) => {
                warn!(reason = %err, "published key cannot be used");
            }
            Err(err) => info!(reason = %err, "identity token rejected"),
        }

        result
    }

    async fn verify(&self, token: &str, options: &VerifyOptions) -> VerificationOutcome {
        let key_set = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.fetcher.fetch_key_set())
                .await
                .map_err(|_| FetchError::Timeout)??,
            None => self.fetcher.fetch_key_set().await?,
        };

        let kid = token::key_id(token);
        let record = select_key(&key_set, kid.as_deref())?;
        let key = convert(record)?;

        if !token::verify(token, &key) {
            return Err(VerificationError::SignatureInvalid);
        }

        let claims = claims::decode(token)?;
        claims::validate(&claims, &ClaimsPolicy::from(options), N::now())?;

        Ok(claims)
    }
}
