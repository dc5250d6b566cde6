//! WATI webhook logger and scheduled journey sync
//!
//! Exposes modules for the binary and for tests.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Built once in `main`, shared by the webhook handler and the admin routes
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub log_writer: services::LogWriter,
    pub scheduler: services::SyncScheduler,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Admin routes protected by API key
    let admin_routes = Router::new()
        .route("/admin/sync/run", post(handlers::run_sync_now))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin_key,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .route("/status", get(handlers::status_check))
        .route("/webhooks/wati", post(handlers::handle_wati_webhook))
        // URL already configured in the WATI dashboard
        .route("/wati-webhook", post(handlers::handle_wati_webhook))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use std::path::Path;

    use crate::services::{RunReport, SyncJob, SyncScheduler};
    use crate::utils::SyncError;

    pub struct StaticJob {
        fail: bool,
    }

    impl StaticJob {
        pub fn ok() -> Self {
            Self { fail: false }
        }

        pub fn failing() -> Self {
            Self { fail: true }
        }
    }

    #[async_trait]
    impl SyncJob for StaticJob {
        async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, SyncError> {
            if self.fail {
                return Err(SyncError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "log dir unreadable",
                )));
            }
            Ok(RunReport {
                started_at: Some(now),
                finished_at: Some(now),
                ..RunReport::default()
            })
        }
    }

    pub fn test_settings(log_dir: &Path) -> crate::config::Settings {
        let mut settings = crate::config::Settings::default();
        settings.wati.webhook_token = Some("secret".to_string());
        settings.admin.api_key = Some("admin-key".to_string());
        settings.logs.dir = log_dir.display().to_string();
        settings
    }

    pub fn test_state_with_settings(settings: crate::config::Settings, job: Arc<dyn SyncJob>) -> Arc<AppState> {
        Arc::new(AppState {
            log_writer: services::LogWriter::new(settings.logs.dir.clone()),
            scheduler: SyncScheduler::new(job, settings.scheduler.interval_seconds),
            settings,
        })
    }

    pub fn test_state_from(settings: crate::config::Settings) -> Arc<AppState> {
        test_state_with_settings(settings, Arc::new(StaticJob::ok()))
    }

    pub fn test_state_with_job(log_dir: &Path, job: Arc<dyn SyncJob>) -> Arc<AppState> {
        test_state_with_settings(test_settings(log_dir), job)
    }

    pub fn test_state(log_dir: &Path) -> Arc<AppState> {
        test_state_from(test_settings(log_dir))
    }

    /// Every JSON line in every day file under `dir`
    pub fn read_log_lines(dir: &Path) -> Vec<Value> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "log"))
            .collect();
        files.sort();

        files
            .iter()
            .flat_map(|p| {
                std::fs::read_to_string(p)
                    .unwrap()
                    .lines()
                    .map(|l| serde_json::from_str(l).unwrap())
                    .collect::<Vec<Value>>()
            })
            .collect()
    }
}
