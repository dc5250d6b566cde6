use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::settings::WatiSettings;
use crate::models::WatiWebhookPayload;
use crate::utils::logging::*;
use crate::utils::normalization::preview;
use crate::utils::{AppError, AppResult};
use crate::AppState;

const ENDPOINT: &str = "/webhooks/wati";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Appends one WATI event to the day log
///
/// Nothing is forwarded from here; the scheduled run picks the line up.
pub async fn handle_wati_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received(ENDPOINT, "POST");

    verify_webhook_auth(&state.settings.wati, query.token.as_deref(), &headers, &body)?;

    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        log_validation_error("payload", &format!("Invalid JSON: {}", e));
        AppError::ValidationError(format!("Invalid JSON payload: {}", e))
    })?;

    let payload: WatiWebhookPayload = serde_json::from_value(raw.clone()).map_err(|e| {
        log_validation_error("payload", &e.to_string());
        AppError::ValidationError(format!("Could not parse webhook payload: {}", e))
    })?;

    let entry = payload.into_log_entry(raw, Utc::now()).map_err(|e| {
        log_validation_error("waId", &e);
        AppError::ValidationError(e)
    })?;

    let path = state.log_writer.append(&entry).await.map_err(|e| {
        log_error(&format!("❌ Failed to append webhook to log: {}", e));
        AppError::from(e)
    })?;

    log_webhook_logged(&entry.phone_number, entry.direction.as_str(), &path.display().to_string());
    tracing::debug!("Message: {}", preview(&entry.message_text, 80));
    log_request_processed(ENDPOINT, 200, start_time.elapsed().as_millis() as u64);

    Ok(Json(json!({ "status": "received" })))
}

/// Accepts the shared token (query or header) or an HMAC signature of the body
fn verify_webhook_auth(
    settings: &WatiSettings,
    query_token: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> AppResult<()> {
    if let Some(expected) = configured(&settings.webhook_token) {
        let provided = query_token.or_else(|| header_str(headers, "X-Wati-Token"));
        if let Some(provided) = provided {
            if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
                return Ok(());
            }
        }
    }

    if let Some(secret) = configured(&settings.signature_secret) {
        if let Some(signature) = header_str(headers, "X-Wati-Signature") {
            return verify_webhook_signature(signature, body, secret);
        }
    }

    log_validation_error("webhook_token", "Missing or invalid webhook secret");
    Err(AppError::Forbidden("Missing or invalid webhook secret".to_string()))
}

fn verify_webhook_signature(signature_header: &str, body: &[u8], secret: &str) -> AppResult<()> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let signature = signature_header.strip_prefix("sha256=").unwrap_or(signature_header);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::ConfigError(format!("Invalid signature secret: {}", e)))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(signature.to_ascii_lowercase().as_bytes(), expected.as_bytes()) {
        log_validation_error("webhook_signature", "Invalid signature");
        return Err(AppError::Forbidden("Invalid webhook signature".to_string()));
    }

    Ok(())
}

fn configured(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// Constant-time comparison for secrets
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_log_lines, test_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const INBOUND: &str = r#"{"eventType":"message","waId":"15550001","text":"Hi, interested in 2BR","timestamp":"1740823200","owner":false}"#;

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_webhook_is_logged() {
        let dir = TempDir::new().unwrap();
        let app = crate::build_router(test_state(dir.path()));

        let response = app.oneshot(post("/webhooks/wati?token=secret", INBOUND)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "received"}));

        let lines = read_log_lines(dir.path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["phone_number"], json!("15550001"));
        assert_eq!(lines[0]["direction"], json!("inbound"));
        assert_eq!(lines[0]["message_text"], json!("Hi, interested in 2BR"));
        assert_eq!(lines[0]["raw_payload"]["waId"], json!("15550001"));
    }

    #[tokio::test]
    async fn test_legacy_webhook_path_is_logged() {
        let dir = TempDir::new().unwrap();

        let app = crate::build_router(test_state(dir.path()));
        let response = app.oneshot(post("/wati-webhook?token=secret", INBOUND)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let app = crate::build_router(test_state(dir.path()));
        let response = app.oneshot(post("/wati-webhook", INBOUND)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let lines = read_log_lines(dir.path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["phone_number"], json!("15550001"));
    }

    #[tokio::test]
    async fn test_header_token_accepted() {
        let dir = TempDir::new().unwrap();
        let app = crate::build_router(test_state(dir.path()));

        let mut request = post("/webhooks/wati", INBOUND);
        request.headers_mut().insert("X-Wati-Token", "secret".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_or_missing_token_is_forbidden() {
        let dir = TempDir::new().unwrap();

        let app = crate::build_router(test_state(dir.path()));
        let response = app.oneshot(post("/webhooks/wati?token=nope", INBOUND)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let app = crate::build_router(test_state(dir.path()));
        let response = app.oneshot(post("/webhooks/wati", INBOUND)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        assert!(read_log_lines(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_and_missing_phone_are_bad_requests() {
        let dir = TempDir::new().unwrap();

        let app = crate::build_router(test_state(dir.path()));
        let response = app.oneshot(post("/webhooks/wati?token=secret", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = crate::build_router(test_state(dir.path()));
        let response = app
            .oneshot(post("/webhooks/wati?token=secret", r#"{"text":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(read_log_lines(dir.path()).is_empty());
    }

    #[test]
    fn test_signature_verification() {
        let settings = WatiSettings {
            webhook_token: None,
            signature_secret: Some("sig-secret".to_string()),
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(b"sig-secret").unwrap();
        mac.update(INBOUND.as_bytes());
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        let mut headers = HeaderMap::new();
        headers.insert("X-Wati-Signature", signature.parse().unwrap());
        assert!(verify_webhook_auth(&settings, None, &headers, INBOUND.as_bytes()).is_ok());

        let tampered = INBOUND.replace("2BR", "3BR");
        assert!(matches!(
            verify_webhook_auth(&settings, None, &headers, tampered.as_bytes()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
