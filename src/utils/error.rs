use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Errors surfaced at the HTTP boundary
#[derive(Debug)]
pub enum AppError {
    Forbidden(String),
    ValidationError(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    StorageError(std::io::Error),
    SyncBusy,
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::StorageError(err) => write!(f, "Log storage error: {}", err),
            AppError::SyncBusy => write!(f, "A sync run is already in progress"),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err)
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Io(e) => AppError::StorageError(e),
            SyncError::Config(msg) => AppError::ConfigError(msg),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::JsonError(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::StorageError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::SyncBusy => (StatusCode::CONFLICT, "sync already running".to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Errors inside the scheduled pipeline
///
/// Only `Config` is fatal, and only at startup. Everything else is logged and
/// counted against the record or run that raised it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 401 / expired token: refresh once and retry once
    #[error("access token rejected by {provider}")]
    AuthExpired { provider: String },

    #[error("{provider} API error: {message}")]
    ExternalApi { provider: String, message: String },

    #[error("OAuth token refresh failed for {provider}: {message}")]
    OAuth { provider: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn external(provider: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::ExternalApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, SyncError::AuthExpired { .. })
    }
}

impl From<zoho_crm::ZohoError> for SyncError {
    fn from(err: zoho_crm::ZohoError) -> Self {
        if err.is_auth_expired() {
            SyncError::AuthExpired {
                provider: "zoho".to_string(),
            }
        } else {
            SyncError::external("zoho", err.to_string())
        }
    }
}

impl From<google_sheets::SheetsError> for SyncError {
    fn from(err: google_sheets::SheetsError) -> Self {
        if err.is_auth_expired() {
            SyncError::AuthExpired {
                provider: "google".to_string(),
            }
        } else {
            SyncError::external("google", err.to_string())
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::external("http", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoho_unauthorized_becomes_auth_expired() {
        let err: SyncError = zoho_crm::ZohoError::Unauthorized {
            status: 401,
            message: "invalid oauth token".to_string(),
        }
        .into();
        assert!(err.is_auth_expired());

        let err: SyncError = zoho_crm::ZohoError::ApiError {
            status: 500,
            code: "INTERNAL_ERROR".to_string(),
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::ExternalApi { ref provider, .. } if provider == "zoho"));
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::Forbidden("x".into()).into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::ValidationError("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SyncBusy.into_response().status(), StatusCode::CONFLICT);
    }
}
