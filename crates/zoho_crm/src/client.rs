//! HTTP client for the Zoho CRM REST API

use crate::error::{Result, ZohoError};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Error codes Zoho uses for a bad or expired OAuth token
const AUTH_ERROR_CODES: &[&str] = &["INVALID_TOKEN", "AUTHENTICATION_FAILURE", "OAUTH_SCOPE_MISMATCH"];

/// Client for the Zoho CRM v2 API
///
/// The access token is passed on every call instead of being stored, so the
/// caller owns token refresh and can retry a call with a new token.
#[derive(Clone)]
pub struct ZohoClient {
    http_client: HttpClient,
    api_domain: String,
}

impl ZohoClient {
    pub const DEFAULT_API_DOMAIN: &'static str = "https://www.zohoapis.com";

    /// Creates a client for the given API domain (e.g. `https://www.zohoapis.in`)
    ///
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(api_domain: impl Into<String>) -> Result<Self> {
        Self::with_timeouts(api_domain, 30, 5)
    }

    pub fn with_timeouts(
        api_domain: impl Into<String>,
        total_timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        let api_domain = api_domain.into();
        if api_domain.trim().is_empty() {
            return Err(ZohoError::ConfigError("api_domain must not be empty".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(total_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(|e| ZohoError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_domain: api_domain.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_domain, endpoint)
    }

    fn auth_header(token: &str) -> String {
        format!("Zoho-oauthtoken {}", token)
    }

    pub(crate) async fn get(&self, token: &str, endpoint: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(endpoint);

        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", Self::auth_header(token))
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub(crate) async fn put(&self, token: &str, endpoint: &str, body: &Value) -> Result<Response> {
        let url = self.url(endpoint);

        tracing::debug!("PUT {} with body: {}", url, body);

        let response = self
            .http_client
            .put(&url)
            .header("Authorization", Self::auth_header(token))
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Maps non-success answers to `ZohoError`
    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

        let (code, message) = match serde_json::from_str::<Value>(&error_body) {
            Ok(json) => (
                json.get("code").and_then(|v| v.as_str()).unwrap_or("UNKNOWN").to_string(),
                json.get("message").and_then(|v| v.as_str()).unwrap_or(&error_body).to_string(),
            ),
            Err(_) => ("UNKNOWN".to_string(), error_body),
        };

        if status == StatusCode::UNAUTHORIZED || AUTH_ERROR_CODES.contains(&code.as_str()) {
            tracing::warn!("Zoho token rejected ({}): {}", status_code, message);
            return Err(ZohoError::Unauthorized {
                status: status_code,
                message,
            });
        }

        tracing::error!("Zoho CRM API error ({}): {} {}", status_code, code, message);

        Err(ZohoError::ApiError {
            status: status_code,
            code,
            message,
        })
    }

    pub fn api_domain(&self) -> &str {
        &self.api_domain
    }
}
