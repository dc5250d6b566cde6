use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

const SERVICE: &str = "wati-journey-sync";

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "message": "WATI webhook logger and journey sync",
        "endpoints": {
            "webhook": "POST /webhooks/wati",
            "webhook_legacy": "POST /wati-webhook",
            "health": "GET /health",
            "ready": "GET /ready",
            "status": "GET /status",
            "sync": "POST /admin/sync/run"
        }
    }))
}

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Ready once settings are loaded and the log directory accepts writes
pub async fn ready_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    log_integration_status_check();

    let log_dir_writable = state.log_writer.is_writable().await;
    let status = if log_dir_writable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": log_dir_writable,
            "service": SERVICE,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "checks": {
                "config_loaded": true,
                "log_dir": {
                    "path": state.log_writer.dir().display().to_string(),
                    "writable": log_dir_writable
                }
            }
        })),
    )
}

pub async fn status_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_integration_status_check();

    let settings = &state.settings;
    let last_run = state.scheduler.last_run().await;

    Json(json!({
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": settings.server.environment,
        "scheduler": {
            "enabled": settings.scheduler.enabled,
            "started": state.scheduler.is_started().await,
            "run_in_progress": state.scheduler.is_run_in_progress(),
            "interval_seconds": state.scheduler.interval_seconds(),
            "lookback_days": settings.scheduler.lookback_days,
            "quiet_period_minutes": settings.scheduler.quiet_period_minutes
        },
        "last_run": last_run,
        "integrations": {
            "zoho": {
                "api_domain": settings.zoho.api_domain,
                "lead_source": settings.zoho.lead_source
            },
            "sheets": {
                "enabled": settings.sheets.enabled,
                "sheet_name": settings.sheets.sheet_name
            },
            "wati": {
                "token_configured": settings.wati.webhook_token.is_some(),
                "signature_configured": settings.wati.signature_secret.is_some()
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get(dir: &std::path::Path, uri: &str) -> (StatusCode, Value) {
        let app = crate::build_router(test_state(dir));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let dir = TempDir::new().unwrap();

        let (status, body) = get(dir.path(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));

        let (status, body) = get(dir.path(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], json!("wati-journey-sync"));
    }

    #[tokio::test]
    async fn test_ready_when_log_dir_writable() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(&dir.path().join("logs"), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], json!(true));
    }

    #[tokio::test]
    async fn test_not_ready_when_log_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let (status, body) = get(&blocker, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], json!(false));
    }

    #[tokio::test]
    async fn test_status_before_any_run() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get(dir.path(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["last_run"], Value::Null);
        assert_eq!(body["scheduler"]["run_in_progress"], json!(false));
    }
}
