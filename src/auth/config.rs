//! OAuth2 refresh-token settings per provider

use serde::{Deserialize, Serialize};

use crate::config::Settings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// Short name used in logs and errors ("zoho", "google")
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
    pub timeout_seconds: u64,
}

impl OAuth2Config {
    pub fn zoho(settings: &Settings) -> Self {
        Self {
            provider: "zoho".to_string(),
            client_id: settings.zoho.client_id.clone(),
            client_secret: settings.zoho.client_secret.clone(),
            refresh_token: settings.zoho.refresh_token.clone(),
            token_url: settings.zoho.accounts_url.clone(),
            timeout_seconds: settings.http.timeout_seconds,
        }
    }

    pub fn google(settings: &Settings) -> Self {
        Self {
            provider: "google".to_string(),
            client_id: settings.sheets.client_id.clone(),
            client_secret: settings.sheets.client_secret.clone(),
            refresh_token: settings.sheets.refresh_token.clone(),
            token_url: settings.sheets.token_url.clone(),
            timeout_seconds: settings.http.timeout_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (value, name) in [
            (&self.client_id, "client_id"),
            (&self.client_secret, "client_secret"),
            (&self.refresh_token, "refresh_token"),
            (&self.token_url, "token_url"),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} OAuth2 {} is not configured", self.provider, name));
            }
        }
        Ok(())
    }
}
