use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Client-caused request problems. The messages are part of the public API.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid location")]
    InvalidLocation,

    #[error("Invalid date")]
    InvalidDate,
}

/// Upstream-caused failures. Cloneable so a single outcome can be handed to
/// every caller waiting on the same fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream returned an invalid response: {0}")]
    UpstreamInvalidResponse(String),
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::UpstreamInvalidResponse(message.into())
    }
}

/// Structured error type returned by the gateway handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_fixed() {
        assert_eq!(
            AppError::from(ValidationError::InvalidLocation).to_string(),
            "Invalid location"
        );
        assert_eq!(
            AppError::from(ValidationError::InvalidDate).to_string(),
            "Invalid date"
        );
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::from(ValidationError::InvalidDate).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(FetchError::unavailable("connection refused")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(FetchError::invalid_response("23 hours")).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
