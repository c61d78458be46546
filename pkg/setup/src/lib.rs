//! Shared setup of HTTP services authenticating with Sign in with Apple.
pub mod middleware;
pub mod tracing;

pub use middleware::{AppleSignInLayer, SignInAuthenticator, TracingHttpServiceLayer};
