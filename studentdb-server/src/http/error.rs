//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.
//! Driver errors are passed through in driver shape, statement included.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::{DbError, DriverError};
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// No live database handle (500)
    NotConnected,

    /// The driver reported an error (500, body is the driver error)
    Driver(DriverError),

    /// Endpoint switched off by configuration (403)
    Forbidden { reason: String },
}

impl ApiError {
    /// Map a database error, attaching the statement that produced it.
    pub fn from_db(err: DbError, sql: &str) -> Self {
        Self::Driver(err.to_driver_error().with_sql(sql))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation_error",
                    "message": e.to_string()
                })),
            )
                .into_response(),
            Self::NotConnected => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database not connected" })),
            )
                .into_response(),
            Self::Driver(e) => {
                tracing::error!(code = %e.code, errno = ?e.errno, "Database error: {}", e.sql_message);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(e)).into_response()
            }
            Self::Forbidden { reason } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "forbidden",
                    "message": reason
                })),
            )
                .into_response(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "name" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn not_connected_is_500_with_fixed_body() {
        let response = ApiError::NotConnected.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Database not connected" })
        );
    }

    #[tokio::test]
    async fn driver_error_passes_through() {
        let err = ApiError::from_db(
            DbError::Query(DriverError {
                code: "ER_1054".into(),
                errno: Some(1054),
                sql_state: Some("42S22".into()),
                sql_message: "Unknown column 'nope' in 'field list'".into(),
                sql: None,
            }),
            "SELECT nope FROM student",
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["errno"], 1054);
        assert_eq!(body["sqlMessage"], "Unknown column 'nope' in 'field list'");
        assert_eq!(body["sql"], "SELECT nope FROM student");
    }

    #[tokio::test]
    async fn forbidden_is_403() {
        let err = ApiError::Forbidden {
            reason: "raw SQL disabled".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
