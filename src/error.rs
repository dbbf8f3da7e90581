//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Domain errors (4xx)
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Storage errors
    #[error(transparent)]
    Store(#[from] StoreError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Domain error carried by this error, if any
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Domain(err) => err.kind(),
            AppError::MissingHeader(_) => "missing_header",
            AppError::Store(StoreError::VersionConflict { .. }) => "version_conflict",
            AppError::Store(StoreError::UniqueViolation { .. }) => "duplicate_record",
            AppError::Store(StoreError::NotFound { .. }) => "not_found",
            AppError::Store(_) => "store_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Domain(err) => match err {
                DomainError::InvalidRequest(_) | DomainError::InvalidCode => {
                    StatusCode::BAD_REQUEST
                }
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::InvalidTransition { .. }
                | DomainError::CapacityExceeded { .. }
                | DomainError::AlreadyAssigned { .. }
                | DomainError::StudentAlreadyAssigned { .. }
                | DomainError::DuplicatePendingApplication { .. }
                | DomainError::RoomNoLongerAvailable { .. }
                | DomainError::RoomOccupied { .. }
                | DomainError::CodeAlreadyConsumed { .. }
                | DomainError::EmailAlreadyRegistered { .. }
                | DomainError::DuplicateRecord { .. } => StatusCode::CONFLICT,
                DomainError::NotAssigned { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::ConsistencyFault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::VersionConflict { .. })
            | AppError::Store(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let details = match &self {
            AppError::Store(StoreError::UniqueViolation { key, .. }) => Some(key.clone()),
            AppError::Domain(DomainError::NotFound { id, .. }) => Some(id.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error,
            error_code: self.kind().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_domain_status_codes() {
        let cases = vec![
            (DomainError::InvalidCode, StatusCode::BAD_REQUEST),
            (DomainError::not_found("Room", "x"), StatusCode::NOT_FOUND),
            (
                DomainError::CapacityExceeded {
                    room_id: Uuid::nil(),
                    capacity: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::Forbidden("admin only".to_string()),
                StatusCode::FORBIDDEN,
            ),
        ];

        for (err, expected) in cases {
            let kind = err.kind();
            let app_err = AppError::from(err);
            assert_eq!(app_err.status(), expected, "{kind}");
            assert_eq!(app_err.kind(), kind);
        }
    }

    #[test]
    fn test_store_errors_map_to_kinds() {
        let err = AppError::from(StoreError::VersionConflict {
            collection: "rooms",
            id: Uuid::nil(),
            expected: 1,
            actual: 2,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "version_conflict");

        let err = AppError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response = AppError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
