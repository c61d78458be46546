//! # Sign in with Apple
//!
//! Verifies the identity tokens an app receives from Sign in with Apple
//! and resolves them to an [`IdentityRecord`]:
//! - fetch Apple's current public keys
//! - verify the RS256 signature of the token
//! - validate issuer, audience and token lifetime
//! - merge the claims with the account details the app forwarded
//!
//! ```ignore
//! let verifier = Verifier::new(HttpKeySetFetcher::new()?);
//! let options = VerifyOptions::new("com.example.app").with_leeway(Duration::from_secs(86_400));
//! let authenticator = Authenticator::new(verifier, InMemoryTokenCache::new(), options);
//!
//! let identity = authenticator.authenticate(token, None).await?;
//! ```
//!
//! # Further readings
//! <https://developer.apple.com/documentation/sign_in_with_apple/sign_in_with_apple_rest_api/verifying_a_user>
pub mod authenticator;
pub mod cache;
pub mod claims;
pub mod clock;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod key;
pub mod models;
pub mod token;
pub mod verifier;

#[cfg(test)]
mod fixture;

pub use authenticator::{Authenticator, ProfileDelegate};
pub use cache::{InMemoryTokenCache, TokenCache};
pub use clock::{Now, SystemNow};
pub use error::{ClaimsDecodeError, ClaimsError, ConversionError, FetchError, VerificationError};
pub use fetch::{APPLE_KEYS_ENDPOINT, HttpKeySetFetcher, KeySetFetcher};
pub use models::{AccountDetails, Claims, IdentityName, IdentityRecord, KeyRecord, KeySet};
pub use verifier::{VerificationOutcome, Verifier, VerifyOptions};

/// Issuer of every Sign in with Apple identity token.
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// Provider tag of identities resolved from Apple identity tokens, also
/// the value clients send in the `X-token-type` header.
pub const PROVIDER: &str = "AppleSignInToken";
