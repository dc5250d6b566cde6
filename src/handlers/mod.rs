pub mod admin;
pub mod health;
pub mod webhook;

pub use admin::run_sync_now;
pub use health::{health_check, index, ready_check, status_check};
pub use webhook::handle_wati_webhook;
