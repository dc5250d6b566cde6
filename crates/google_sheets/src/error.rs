//! Error types for the google_sheets crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// 401 / UNAUTHENTICATED: the bearer token is missing, invalid or expired
    #[error("Google rejected the access token (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Sheets API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SheetsError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, SheetsError::Unauthorized { .. })
    }
}

pub type Result<T> = std::result::Result<T, SheetsError>;
