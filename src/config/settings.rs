use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub wati: WatiSettings,
    pub logs: LogSettings,
    pub scheduler: SchedulerSettings,
    pub zoho: ZohoSettings,
    pub sheets: SheetsSettings,
    pub admin: AdminSettings,
    pub journey: JourneySettings,
    pub http: HttpSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            environment: "development".to_string(),
        }
    }
}

/// Webhook authentication; at least one of the two must be set
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WatiSettings {
    /// Shared secret sent as `?token=` or `X-Wati-Token`
    pub webhook_token: Option<String>,
    /// HMAC-SHA256 key for `X-Wati-Signature`
    pub signature_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogSettings {
    pub dir: String,
    /// Sync ledger location; defaults to `{dir}/sync_ledger.json`
    pub ledger_path: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            ledger_path: None,
        }
    }
}

impl LogSettings {
    pub fn ledger_path(&self) -> std::path::PathBuf {
        match &self.ledger_path {
            Some(path) => path.into(),
            None => std::path::Path::new(&self.dir).join("sync_ledger.json"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Prior day files re-read on every run, besides today's
    pub lookback_days: u32,
    /// Conversations with activity newer than this wait for the next run
    pub quiet_period_minutes: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            lookback_days: 1,
            quiet_period_minutes: 7,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ZohoSettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub accounts_url: String,
    pub api_domain: String,
    pub lead_source: String,
}

impl Default for ZohoSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            accounts_url: "https://accounts.zoho.com/oauth/v2/token".to_string(),
            api_domain: zoho_crm::ZohoClient::DEFAULT_API_DOMAIN.to_string(),
            lead_source: "WATI".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SheetsSettings {
    pub enabled: bool,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
    pub base_url: String,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            spreadsheet_id: String::new(),
            sheet_name: "Journeys".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            base_url: google_sheets::SheetsClient::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AdminSettings {
    /// `X-Admin-Key` value; admin routes answer 503 when unset
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct JourneySettings {
    pub rules_path: String,
    pub field_mapping_path: String,
}

impl Default for JourneySettings {
    fn default() -> Self {
        Self {
            rules_path: "config/journey_rules.yaml".to_string(),
            field_mapping_path: "config/field_mapping.yaml".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 5,
        }
    }
}

/// Well-known variables and the keys they override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("WATI_WEBHOOK_TOKEN", "wati.webhook_token"),
    ("WATI_SIGNATURE_SECRET", "wati.signature_secret"),
    ("LOG_FOLDER", "logs.dir"),
    ("ZOHO_CLIENT_ID", "zoho.client_id"),
    ("ZOHO_CLIENT_SECRET", "zoho.client_secret"),
    ("ZOHO_REFRESH_TOKEN", "zoho.refresh_token"),
    ("ZOHO_API_DOMAIN", "zoho.api_domain"),
    ("GOOGLE_CLIENT_ID", "sheets.client_id"),
    ("GOOGLE_CLIENT_SECRET", "sheets.client_secret"),
    ("GOOGLE_REFRESH_TOKEN", "sheets.refresh_token"),
    ("SHEETS_SPREADSHEET_ID", "sheets.spreadsheet_id"),
    ("SYNC_INTERVAL_SECONDS", "scheduler.interval_seconds"),
    ("ADMIN_API_KEY", "admin.api_key"),
    ("PORT", "server.port"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Base file
            .add_source(File::with_name("config/default").required(false))
            // Per-environment file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .set_default("server.environment", run_mode.clone())?;

        builder = builder.add_source(
            Environment::with_prefix("WATI_SYNC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    builder = builder.set_override(*key, value)?;
                }
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Missing credentials abort startup instead of failing on the first run
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();

        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.wati.webhook_token) && blank(&self.wati.signature_secret) {
            missing.push("wati.webhook_token or wati.signature_secret (WATI_WEBHOOK_TOKEN)");
        }

        for (value, name) in [
            (&self.zoho.client_id, "zoho.client_id (ZOHO_CLIENT_ID)"),
            (&self.zoho.client_secret, "zoho.client_secret (ZOHO_CLIENT_SECRET)"),
            (&self.zoho.refresh_token, "zoho.refresh_token (ZOHO_REFRESH_TOKEN)"),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }

        if self.sheets.enabled {
            for (value, name) in [
                (&self.sheets.spreadsheet_id, "sheets.spreadsheet_id (SHEETS_SPREADSHEET_ID)"),
                (&self.sheets.client_id, "sheets.client_id (GOOGLE_CLIENT_ID)"),
                (&self.sheets.client_secret, "sheets.client_secret (GOOGLE_CLIENT_SECRET)"),
                (&self.sheets.refresh_token, "sheets.refresh_token (GOOGLE_REFRESH_TOKEN)"),
            ] {
                if value.trim().is_empty() {
                    missing.push(name);
                }
            }
        }

        if !missing.is_empty() {
            return Err(format!("missing required settings: {}", missing.join(", ")));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err("scheduler.interval_seconds must be greater than zero".to_string());
        }
        if self.zoho.lead_source.trim().is_empty() {
            return Err("zoho.lead_source must not be empty".to_string());
        }
        // A conversation deferred just before midnight is only read again from yesterday's file
        if self.scheduler.lookback_days == 0 && self.scheduler.quiet_period_minutes > 0 {
            return Err(
                "scheduler.lookback_days must be at least 1 when scheduler.quiet_period_minutes is set".to_string(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Settings {
        let mut settings = Settings::default();
        settings.wati.webhook_token = Some("secret".to_string());
        settings.zoho.client_id = "id".to_string();
        settings.zoho.client_secret = "secret".to_string();
        settings.zoho.refresh_token = "refresh".to_string();
        settings.sheets.spreadsheet_id = "sheet".to_string();
        settings.sheets.client_id = "gid".to_string();
        settings.sheets.client_secret = "gsecret".to_string();
        settings.sheets.refresh_token = "grefresh".to_string();
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.logs.dir, "logs");
        assert_eq!(settings.scheduler.quiet_period_minutes, 7);
        assert_eq!(settings.zoho.lead_source, "WATI");
        assert_eq!(settings.http.timeout_seconds, 30);
        assert_eq!(settings.logs.ledger_path(), std::path::Path::new("logs").join("sync_ledger.json"));
    }

    #[test]
    fn test_validate_reports_missing_credentials() {
        assert!(complete().validate().is_ok());

        let mut settings = complete();
        settings.zoho.refresh_token.clear();
        let err = settings.validate().unwrap_err();
        assert!(err.contains("ZOHO_REFRESH_TOKEN"));

        let mut settings = complete();
        settings.wati.webhook_token = None;
        assert!(settings.validate().unwrap_err().contains("WATI_WEBHOOK_TOKEN"));
    }

    #[test]
    fn test_quiet_period_needs_lookback() {
        let mut settings = complete();
        settings.scheduler.lookback_days = 0;
        assert!(settings.validate().unwrap_err().contains("lookback_days"));

        settings.scheduler.quiet_period_minutes = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sheets_credentials_optional_when_disabled() {
        let mut settings = complete();
        settings.sheets.enabled = false;
        settings.sheets.refresh_token.clear();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "[scheduler]\ninterval_seconds = 60\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.scheduler.interval_seconds, 60);
        assert_eq!(settings.scheduler.lookback_days, 1);
        assert_eq!(settings.server.port, 5000);
    }
}
