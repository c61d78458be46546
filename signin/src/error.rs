use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Error for api endpoints.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
