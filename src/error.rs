use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::TrackerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        if err.is_validation() {
            return AppError::BadRequest(err.to_string());
        }
        match err {
            TrackerError::NoPnlHistory(_)
            | TrackerError::PositionsNotLoaded(_)
            | TrackerError::PositionNotFound(_)
            | TrackerError::NoPositionsFound => AppError::NotFound(err.to_string()),
            TrackerError::PositionClosed
            | TrackerError::PositionLiquidated
            | TrackerError::CannotLiquidate { .. }
            | TrackerError::FundingRateOutOfRange => AppError::Conflict(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
