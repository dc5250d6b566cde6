/// Admin endpoint authentication
///
/// Requests to `/admin/*` must carry the configured key in `X-Admin-Key`.
/// With no key configured the admin surface is closed (503), never open.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::handlers::webhook::constant_time_eq;
use crate::AppState;

/// # Responses
///
/// - key valid: continues to the handler
/// - **401 Unauthorized**: key missing or wrong
/// - **503 Service Unavailable**: `ADMIN_API_KEY` not configured
pub async fn require_admin_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let provided_key = headers.get("X-Admin-Key").and_then(|v| v.to_str().ok());

    let expected_key = state
        .settings
        .admin
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    match (expected_key, provided_key) {
        (Some(expected), Some(provided)) if constant_time_eq(expected.as_bytes(), provided.as_bytes()) => {
            tracing::debug!("✅ Admin access granted");
            Ok(next.run(request).await)
        }
        (Some(_), provided) => {
            tracing::warn!(
                "❌ Admin access denied - Invalid or missing X-Admin-Key: {:?}",
                provided.map(|_| "<redacted>")
            );
            Err(unauthorized_response())
        }
        (None, _) => {
            tracing::error!("🚨 ADMIN_API_KEY not configured! Blocking admin access.");
            Err(service_unavailable_response())
        }
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Unauthorized",
            "message": "Missing or invalid X-Admin-Key header",
            "status": 401
        })),
    )
        .into_response()
}

fn service_unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "Service Unavailable",
            "message": "ADMIN_API_KEY not configured on server",
            "status": 503
        })),
    )
        .into_response()
}
