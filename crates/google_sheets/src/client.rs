//! HTTP client for the Google Sheets v4 API

use crate::error::{Result, SheetsError};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Client bound to one spreadsheet
#[derive(Clone)]
pub struct SheetsClient {
    http_client: HttpClient,
    base_url: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://sheets.googleapis.com/v4";

    pub fn new(spreadsheet_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, spreadsheet_id, 30, 5)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        total_timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(SheetsError::ConfigError("spreadsheet_id must not be empty".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(total_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(|e| SheetsError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id,
        })
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}` with the range percent-encoded
    pub(crate) fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    pub(crate) async fn get(&self, token: &str, url: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);

        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        self.handle_response(response).await
    }

    pub(crate) async fn post(&self, token: &str, url: &str, query: &[(&str, &str)], body: &Value) -> Result<Response> {
        tracing::debug!("POST {} {:?}", url, query);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .query(query)
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub(crate) async fn put(&self, token: &str, url: &str, query: &[(&str, &str)], body: &Value) -> Result<Response> {
        tracing::debug!("PUT {} {:?}", url, query);

        let response = self
            .http_client
            .put(url)
            .bearer_auth(token)
            .query(query)
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

        // {"error": {"code": 401, "message": "...", "status": "UNAUTHENTICATED"}}
        let (message, api_status) = match serde_json::from_str::<Value>(&error_body) {
            Ok(json) => (
                json.pointer("/error/message")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&error_body)
                    .to_string(),
                json.pointer("/error/status")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            ),
            Err(_) => (error_body, String::new()),
        };

        if status == StatusCode::UNAUTHORIZED || api_status == "UNAUTHENTICATED" {
            tracing::warn!("Google token rejected ({}): {}", status_code, message);
            return Err(SheetsError::Unauthorized {
                status: status_code,
                message,
            });
        }

        tracing::error!("Sheets API error ({}): {}", status_code, message);

        Err(SheetsError::ApiError {
            status: status_code,
            message,
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
