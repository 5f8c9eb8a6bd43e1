use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));

        (self.status, body).into_response()
    }
}

/// Every way a gateway request can fail, as the caller sees it.
///
/// The message text carries a stable error code so callers and the audit
/// log classify failures the same way.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Server setup does not finished. (Error code: 001)")]
    SetupIncomplete,
    #[error("Invalid auth token given. (Error code: 002)")]
    InvalidToken,
    #[error("Internal server error (Error code: 003)")]
    SigningFailed,
    #[error("The requested file id is invalid for you. (Error code: 004)")]
    PermissionDenied,
    #[error("InternalServerError. (Error code: 005)")]
    Internal,
    #[error("Unsupported operation given. (Error code: 006)")]
    UnsupportedOperation,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SetupIncomplete | Self::SigningFailed | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidToken | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::UnsupportedOperation => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::new(err.status(), err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}
