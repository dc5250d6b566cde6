use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use crate::services::TriggerOutcome;
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

const ENDPOINT: &str = "/admin/sync/run";

/// Runs the sync now; 409 when a run is already in progress
pub async fn run_sync_now(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received(ENDPOINT, "POST");

    match state.scheduler.trigger().await {
        TriggerOutcome::Completed(report) => {
            log_request_processed(ENDPOINT, 200, start_time.elapsed().as_millis() as u64);
            Ok(Json(json!({
                "status": "completed",
                "report": report
            })))
        }
        TriggerOutcome::Skipped => Err(AppError::SyncBusy),
        TriggerOutcome::Failed(e) => Err(AppError::InternalError(format!("Sync run failed: {}", e))),
    }
}
