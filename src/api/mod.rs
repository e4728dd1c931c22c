pub mod auth;
pub mod rest;
pub mod ws;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::error::AnalysisError;

pub use rest::router;

/// Handler error mapped onto an HTTP status with a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub enum ApiError {
    /// Bad input to an analysis function (400), unknown indicator (404).
    Analysis(AnalysisError),
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        Self::Analysis(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Analysis(e @ AnalysisError::UnknownIndicator(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            Self::Analysis(e) => {
                warn!(error = %e, "analysis request rejected");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => {
                warn!(error = %msg, "bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
