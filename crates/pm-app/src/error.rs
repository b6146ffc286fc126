use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pm_core::PollerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Poller(#[from] PollerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidRequest(_) | Self::Poller(PollerError::EmptyJobId) => {
                StatusCode::BAD_REQUEST
            }
            Self::Poller(PollerError::NoActiveJob) => StatusCode::CONFLICT,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
