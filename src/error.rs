use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Database(sqlx::Error),
    /// A hard dependency failed; `context` names the fetch that failed.
    Context {
        context: &'static str,
        source: Box<AppError>,
    },
    /// Batch aggregation finished with `failed` of `total` organizations failing.
    PartialFailure { failed: usize, total: usize },
}

impl AppError {
    pub fn context(self, context: &'static str) -> Self {
        AppError::Context {
            context,
            source: Box::new(self),
        }
    }
}

/// Attach a short operation name to a store error.
pub trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|e| e.context(context))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::Database(e) => write!(f, "database error: {e}"),
            AppError::Context { context, source } => write!(f, "{context}: {source}"),
            AppError::PartialFailure { failed, total } => {
                write!(f, "aggregation failed for {failed} of {total} organizations")
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => {
                tracing::warn!(error_type = "not_found", message = %msg, "Responding with 404");
                (StatusCode::NOT_FOUND, msg)
            }
            AppError::BadRequest(msg) => {
                tracing::warn!(error_type = "bad_request", message = %msg, "Responding with 400");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::PartialFailure { failed, total } => {
                let msg = AppError::PartialFailure { failed, total }.to_string();
                tracing::error!(error_type = "partial_failure", message = %msg, "Responding with 500");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            e @ (AppError::Database(_) | AppError::Context { .. }) => {
                tracing::error!(error_type = "database", error = %e, "Responding with 500");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_prefixes_message() {
        let err = AppError::NotFound("org".into()).context("get agents");
        assert_eq!(err.to_string(), "get agents: not found: org");
    }

    #[test]
    fn test_partial_failure_message_names_counts() {
        let err = AppError::PartialFailure { failed: 2, total: 5 };
        assert_eq!(
            err.to_string(),
            "aggregation failed for 2 of 5 organizations"
        );
    }
}
