//! Authentication of requests carrying a Sign in with Apple identity token.
//!
//! Ties the verifier to identity resolution and the token cache:
//! - a cached identity is returned without verifying the token again
//! - otherwise the token is verified and its identity resolved
//! - the profile delegate may amend the identity before it is cached
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::PROVIDER;
use crate::cache::TokenCache;
use crate::clock::{Now, SystemNow};
use crate::error::VerificationError;
use crate::fetch::KeySetFetcher;
use crate::identity::resolve;
use crate::models::{AccountDetails, IdentityRecord};
use crate::verifier::{Verifier, VerifyOptions};

/// Hook to amend an identity after it was resolved, e.g. with data from
/// the application's own user store.
pub trait ProfileDelegate: Send + Sync + 'static {
    fn update(&self, identity: &mut IdentityRecord);
}

/// Verifies identity tokens and resolves them to identities.
pub struct Authenticator<F, C, N = SystemNow> {
    verifier: Verifier<F, N>,
    cache: C,
    options: VerifyOptions,
    token_time_to_live: Option<Duration>,
    delegate: Option<Arc<dyn ProfileDelegate>>,
}

impl<F, C, N> Authenticator<F, C, N>
where
    F: KeySetFetcher,
    C: TokenCache,
    N: Now,
{
    pub fn new(verifier: Verifier<F, N>, cache: C, options: VerifyOptions) -> Self {
        Self {
            verifier,
            cache,
            options,
            token_time_to_live: None,
            delegate: None,
        }
    }

    /// Caps how long a resolved identity stays cached. Without a cap it
    /// stays until the token expires.
    #[must_use]
    pub fn with_token_time_to_live(mut self, ttl: Duration) -> Self {
        self.token_time_to_live = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_profile_delegate(mut self, delegate: Arc<dyn ProfileDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    #[must_use]
    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    /// Returns the identity asserted by a token.
    ///
    /// # Errors
    /// - the token does not verify, see [`Verifier::verify_token`]
    #[instrument(skip_all, fields(user_id))]
    pub async fn authenticate(
        &self,
        token: &str,
        account_details: Option<&AccountDetails>,
    ) -> Result<IdentityRecord, VerificationError> {
        if let Some(identity) = self.cache.get(token) {
            tracing::Span::current().record("user_id", identity.id.as_str());
            debug!("identity served from cache");
            return Ok(identity);
        }

        let claims = self.verifier.verify_token(token, &self.options).await?;

        let mut identity = resolve(&claims, account_details, PROVIDER);
        if let Some(delegate) = &self.delegate {
            delegate.update(&mut identity);
        }
        tracing::Span::current().record("user_id", identity.id.as_str());

        let ttl = self.cache_time_to_live(identity.expires_at);
        self.cache.put(token, identity.clone(), ttl);

        Ok(identity)
    }

    /// The configured time to live, bounded by the token's acceptance
    /// window.
    fn cache_time_to_live(&self, expires_at: Option<DateTime<Utc>>) -> Option<Duration> {
        let remaining = expires_at.map(|expires_at| {
            let accepted_until = chrono::Duration::from_std(self.options.leeway)
                .ok()
                .and_then(|leeway| expires_at.checked_add_signed(leeway))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            (accepted_until - N::now()).to_std().unwrap_or(Duration::ZERO)
        });

        match (self.token_time_to_live, remaining) {
            (Some(ttl), Some(remaining)) => Some(ttl.min(remaining)),
            (ttl, remaining) => ttl.or(remaining),
        }
    }
}
