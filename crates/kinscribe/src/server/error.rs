use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use kinscribe_core::error::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(super) fn map_core_error(err: CoreError) -> AppError {
    if err.is_validation() {
        return AppError::BadRequest(err.to_string());
    }
    match err {
        CoreError::InsufficientFunds { .. } | CoreError::InvalidConfig(_) => {
            AppError::BadRequest(err.to_string())
        }
        CoreError::InvalidState(msg) => AppError::Conflict(msg),
        CoreError::NodeUnavailable(_) | CoreError::RejectedByNode(_) | CoreError::Rpc(_) => {
            AppError::BadGateway(err.to_string())
        }
        other => AppError::Internal(other.to_string()),
    }
}
