use appleid::IdentityRecord;
use axum::{Extension, Json};
use axum_macros::debug_handler;
use tracing::instrument;

use crate::error::ApiError;

/// Gets the current authenticated user.
#[debug_handler]
#[instrument(skip_all, err)]
pub async fn get_current_user(
    identity: Option<Extension<IdentityRecord>>,
) -> Result<Json<IdentityRecord>, ApiError> {
    let Some(Extension(identity)) = identity else {
        return Err(ApiError::Unauthenticated);
    };
    Ok(Json(identity))
}

/// Liveness probe. Does not require authentication.
#[debug_handler]
pub async fn health() -> &'static str {
    "ok"
}
