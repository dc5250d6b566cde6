//! Error types for the zoho_crm crate

use thiserror::Error;

/// Zoho CRM client errors
#[derive(Debug, Error)]
pub enum ZohoError {
    /// HTTP transport failure (connect, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Access token rejected (401, INVALID_TOKEN, AUTHENTICATION_FAILURE)
    #[error("Zoho rejected the access token (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Any other non-success answer from the API
    #[error("Zoho CRM API error (status {status}, code {code}): {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ZohoError {
    /// True when a fresh token could make the same call succeed
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ZohoError::Unauthorized { .. })
    }
}

pub type Result<T> = std::result::Result<T, ZohoError>;
