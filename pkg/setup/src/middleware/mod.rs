pub mod auth;
pub mod tracing;
pub use auth::{AppleSignInLayer, SignInAuthenticator};
pub use tracing::TracingHttpServiceLayer;
