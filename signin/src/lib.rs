//! # Sign in with Apple service
//!
//! Serves the identity of users that authenticate with a Sign in with
//! Apple identity token:
//! - `GET /me` returns the authenticated [`IdentityRecord`](appleid::IdentityRecord)
//! - `GET /health` is served without authentication
pub mod config;
pub mod error;
pub mod handler;

use std::sync::Arc;

use appleid::{Authenticator, FetchError, HttpKeySetFetcher, InMemoryTokenCache, Verifier};
use axum::Router;
use axum::routing::get;
use setup::{AppleSignInLayer, SignInAuthenticator, TracingHttpServiceLayer};

use crate::config::Config;
use crate::handler::{get_current_user, health};

pub const SERVICE_NAME: &str = "signin";

/// Authenticator backed by Apple's key endpoint and an in-memory cache.
pub type AppleAuthenticator = Authenticator<HttpKeySetFetcher, InMemoryTokenCache>;

/// Creates the authenticator described by the config.
///
/// # Errors
/// - the keys endpoint is not a valid URL
/// - the http client cannot be built
pub fn authenticator(cfg: &Config) -> Result<AppleAuthenticator, FetchError> {
    let fetcher = HttpKeySetFetcher::with_endpoint(&cfg.keys_endpoint)?;
    let authenticator = Authenticator::new(
        Verifier::new(fetcher),
        InMemoryTokenCache::new(),
        cfg.verify_options(),
    );

    Ok(match cfg.token_time_to_live {
        Some(ttl) => authenticator.with_token_time_to_live(ttl),
        None => authenticator,
    })
}

/// Builds the service routes behind authentication and request tracing.
pub fn router<A: SignInAuthenticator>(authenticator: Arc<A>) -> Router {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/health", get(health))
        .layer(AppleSignInLayer::new(
            authenticator,
            vec![String::from("/health")],
        ))
        .layer(TracingHttpServiceLayer)
}
