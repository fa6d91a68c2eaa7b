use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use rulegate_core::error::CoreError;
use rulegate_pipeline::{ExecutionError, StoreError, ValidationExecutionFailed};
use rulegate_reporting::ReportError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the library error types and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `rulegate_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A collaborator store failure outside of a validation run.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A synchronous validation run that did not complete.
    #[error(transparent)]
    Execution(#[from] ValidationExecutionFailed),

    /// CSV rendering failure.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::NotFoundByKey { entity, key } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} '{key}' not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Store errors ---
            AppError::Store(err) => classify_store_error(err),

            // --- Validation runs ---
            AppError::Execution(err) => match err.cause() {
                ExecutionError::ConfigNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "CONFIG_NOT_FOUND", err.to_string())
                }
                ExecutionError::Data(StoreError::InvalidDataSource(_)) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
                }
                _ => {
                    tracing::error!(error = %err, "Validation execution failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "VALIDATION_EXECUTION_FAILED",
                        err.to_string(),
                    )
                }
            },

            AppError::Report(err) => {
                tracing::error!(error = %err, "Report rendering failed");
                internal()
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Database(db) => classify_sqlx_error(db),
        StoreError::InvalidDataSource(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        StoreError::Decode(decode) => {
            tracing::error!(error = %decode, "Stored data could not be decoded");
            internal()
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
