//! OAuth2 HTTP client
//!
//! Only the refresh-token grant: both Zoho and Google hand out long-lived
//! refresh tokens during a one-time consent, and the service trades them for
//! short-lived access tokens.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::OAuth2Config;
use crate::utils::logging::*;
use crate::utils::SyncError;

/// Token endpoint response
///
/// Zoho answers some failures with 200 and an `error` field, so `error` is
/// checked even on success.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Zoho only: data-center specific API domain
    #[serde(default)]
    pub api_domain: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Access token plus its lifetime in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: u64,
}

/// Used when the provider omits `expires_in`; both document one hour
const DEFAULT_EXPIRES_IN: u64 = 3600;

pub struct OAuth2Client {
    config: OAuth2Config,
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(config: OAuth2Config) -> Result<Self, SyncError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create OAuth HTTP client: {}", e)))?;

        Ok(Self { config, http_client })
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// `grant_type=refresh_token` exchange
    pub async fn refresh_access_token(&self) -> Result<AccessToken, SyncError> {
        log_info(&format!("🔐 [OAuth2] Refreshing {} access token", self.config.provider));

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.oauth_error(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log_error(&format!(
                "❌ [OAuth2] {} token refresh failed: {} - {}",
                self.config.provider, status, error_text
            ));
            return Err(self.oauth_error(format!("[{}] {}", status, error_text)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| self.oauth_error(format!("invalid token response: {}", e)))?;

        if let Some(error) = body.error {
            log_error(&format!("❌ [OAuth2] {} token refresh rejected: {}", self.config.provider, error));
            return Err(self.oauth_error(error));
        }

        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.oauth_error("response has no access_token"))?;

        log_info(&format!("✅ [OAuth2] {} access token refreshed", self.config.provider));

        Ok(AccessToken {
            token,
            expires_in: body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }

    fn oauth_error(&self, message: impl Into<String>) -> SyncError {
        SyncError::OAuth {
            provider: self.config.provider.clone(),
            message: message.into(),
        }
    }
}
