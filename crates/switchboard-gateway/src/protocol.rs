//! HTTP wire contract — JSON bodies and the error-to-status translation

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use switchboard_core::ProviderError;

pub use switchboard_core::{ChatReply, ChatRequest};

/// Failure body for every error status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Translate a normalized error into the external response. The only place
/// a [`ProviderError`] becomes an HTTP status.
pub fn error_response(err: &ProviderError) -> (StatusCode, Json<ErrorDetail>) {
    let status = StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorDetail {
            detail: err.to_string(),
        }),
    )
}
