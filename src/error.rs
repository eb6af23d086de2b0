use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Errors raised synchronously by the booking engine. Notification failures
/// are never surfaced through this type; they are logged where they happen.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("appointment not found")]
    NotFound,
    #[error("service not found")]
    ServiceNotFound,
    #[error("slot is not available")]
    SlotUnavailable,
    #[error("invalid time string: {0}")]
    InvalidFormat(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::ServiceNotFound => StatusCode::NOT_FOUND,
            Self::SlotUnavailable => StatusCode::CONFLICT,
            Self::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::Db(err) => {
                log::error!("Database error: {err}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "ok": false, "message": message }))
    }
}
