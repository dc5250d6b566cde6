/// Middleware layer for the Axum router
///
/// - Admin endpoint authentication (`X-Admin-Key`)

pub mod admin_auth;

pub use admin_auth::require_admin_key;
