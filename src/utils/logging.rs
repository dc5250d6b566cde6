use tracing::{debug, error, info, warn};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_webhook_logged(phone: &str, direction: &str, file: &str) {
    info!("📝 WATI message logged: {} ({}) -> {}", phone, direction, file);
}

pub fn log_crm_lead_updated(lead_id: &str, phone: &str) {
    info!("✏️ Zoho lead updated: {} - Mobile: {}", lead_id, phone);
}

pub fn log_crm_api_error(operation: &str, phone: &str, error: &str) {
    error!("Zoho CRM error: {} - Mobile: {} - Error: {}", operation, phone, error);
}

pub fn log_sheet_api_error(operation: &str, phone: &str, error: &str) {
    error!("Sheets error: {} - Key: {} - Error: {}", operation, phone, error);
}

pub fn log_run_summary(summary: &str) {
    info!("🔁 Sync run finished: {}", summary);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 WATI journey sync server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_integration_status_check() {
    debug!("Integration status check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
