//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use trail_core::TrailError;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Request content failed validation
    BadRequest(String),
    /// A referenced vertex is missing or has the wrong type
    InvalidReference(String),
    /// Unknown vertex, reported as a client error
    UnknownVertex(String),
    /// Unknown resource on a fetch route
    NotFound(String),
    Internal(String),
    Database(String),
}

impl AppError {
    /// Fetch routes report unknown vertices as 404 rather than 400
    pub fn not_found_on_fetch(err: TrailError) -> Self {
        match err {
            TrailError::NotFound(msg) => AppError::NotFound(msg),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
            AppError::InvalidReference(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("INVALID_REFERENCE", msg),
            ),
            AppError::UnknownVertex(msg) => (StatusCode::BAD_REQUEST, ApiError::new("NOT_FOUND", msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error().with_details(msg),
            ),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("DATABASE_ERROR", "Database operation failed").with_details(msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<TrailError> for AppError {
    fn from(err: TrailError) -> Self {
        match err {
            TrailError::InvalidInput(msg) => AppError::BadRequest(msg),
            TrailError::InvalidReference(msg) => AppError::InvalidReference(msg),
            TrailError::NotFound(msg) => AppError::UnknownVertex(msg),
            TrailError::MalformedAttributes(msg) => {
                AppError::Internal(format!("Malformed attributes: {msg}"))
            }
            TrailError::DatabaseError(msg) => AppError::Database(msg),
            TrailError::ConfigError(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            TrailError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: TrailError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_trail_error_status_mapping() {
        assert_eq!(status_of(TrailError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(TrailError::InvalidReference("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(TrailError::NotFound("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(TrailError::MalformedAttributes("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TrailError::DatabaseError("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fetch_routes_use_404() {
        let response = AppError::not_found_on_fetch(TrailError::NotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            AppError::not_found_on_fetch(TrailError::InvalidInput("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_rejection_is_bad_request() {
        let rejection = axum::Json::<serde_json::Value>::from_bytes(b"{\"deviceGuid\":")
            .err()
            .unwrap();
        match AppError::from(rejection) {
            AppError::BadRequest(msg) => assert!(!msg.is_empty()),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
