//! Domain errors with HTTP status and CLI exit-code mappings (§7).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Problem-document error body every HTTP endpoint returns on failure (§6.4, §7).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Domain errors with HTTP status code and CLI exit code mappings.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Validation error (400 Bad Request / exit 2 usage).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Multiple validation errors (400 Bad Request / exit 2 usage).
    #[error("Validation failed")]
    ValidationErrors(Vec<String>),

    /// Resource not found (404 Not Found).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unauthorized (401 Unauthorized).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403 Forbidden).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (409 Conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity — business logic error (422 Unprocessable Entity).
    #[error("Business logic error: {0}")]
    BusinessLogic(String),

    /// Rate limit exceeded (429 Too Many Requests).
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// A mutating call reached the Notion adapter while write-protection is
    /// on (§4.A). Fails fast; never retried.
    #[error("Write-protected: {0}")]
    WriteProtected(String),

    /// Optimistic-lock rejection on a concurrent atom update (§5, §7).
    #[error("Stale atom version for {0}")]
    StaleAtom(String),

    /// A sync run ended in `failed` status, naming the violated constraint (§4.B, §7).
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// Analyzer input missing a required field; the caller should skip with
    /// a warning rather than abort (§4.E, §7).
    #[error("Malformed analyzer input: {0}")]
    AnalyzerMalformedInput(String),

    /// Configuration error (exit 3 config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500 Internal Server Error).
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    /// Database error (500 Internal Server Error).
    #[error("Database error")]
    Database(String),
}

impl DomainError {
    /// HTTP status code for this error (§6.4, §7).
    pub fn status_code(&self) -> StatusCode {
        match self {
            DomainError::Validation(_) | DomainError::ValidationErrors(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) | DomainError::WriteProtected(_) => StatusCode::FORBIDDEN,
            DomainError::Conflict(_) | DomainError::StaleAtom(_) => StatusCode::CONFLICT,
            DomainError::BusinessLogic(_) | DomainError::AnalyzerMalformedInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DomainError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            DomainError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DomainError::SyncFailed(_)
            | DomainError::Internal(_)
            | DomainError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// CLI exit code per §6.3: 0 success, 1 error, 2 usage, 3 config.
    /// Every CLI entry point maps its terminal `Result<_, DomainError>` through
    /// this method to pick `std::process::exit`'s argument.
    pub fn exit_code(&self) -> i32 {
        match self {
            DomainError::Validation(_) | DomainError::ValidationErrors(_) => 2,
            DomainError::Config(_) => 3,
            _ => 1,
        }
    }

    /// A short machine-readable error code, used as `error_code` in the
    /// problem document (§6.4) and logged alongside `tracing::error!`.
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) | DomainError::ValidationErrors(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Conflict(_) => "conflict",
            DomainError::BusinessLogic(_) => "business_logic_error",
            DomainError::RateLimitExceeded => "rate_limit_exceeded",
            DomainError::WriteProtected(_) => "write_protected",
            DomainError::StaleAtom(_) => "stale_atom",
            DomainError::SyncFailed(_) => "sync_failed",
            DomainError::AnalyzerMalformedInput(_) => "analyzer_malformed_input",
            DomainError::Config(_) => "config_error",
            DomainError::Internal(_) => "internal_error",
            DomainError::Database(_) => "database_error",
        }
    }

    /// Builds a validation error from `validator` crate errors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error
                            .message
                            .as_ref()
                            .unwrap_or(&std::borrow::Cow::Borrowed("validation failed"))
                    )
                })
            })
            .collect();

        if messages.is_empty() {
            DomainError::Validation("Invalid input".to_string())
        } else {
            DomainError::ValidationErrors(messages)
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if matches!(
            self,
            DomainError::Internal(_) | DomainError::Database(_) | DomainError::SyncFailed(_)
        ) {
            tracing::error!(error_code = self.error_code(), "{}", self);
        }

        let body = match &self {
            DomainError::ValidationErrors(details) => ErrorResponse {
                error_code: self.error_code().to_string(),
                message: "Validation failed".to_string(),
                details: Some(details.clone()),
            },
            _ => ErrorResponse {
                error_code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_match_cli_contract() {
        assert_eq!(DomainError::Validation("x".into()).exit_code(), 2);
        assert_eq!(DomainError::Config("x".into()).exit_code(), 3);
        assert_eq!(DomainError::Database("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_write_protected_is_forbidden() {
        assert_eq!(
            DomainError::WriteProtected("notion.update".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_stale_atom_is_conflict() {
        assert_eq!(
            DomainError::StaleAtom("atom-1".into()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
