//! # OAuth2 access tokens for Zoho CRM and Google Sheets
//!
//! - `config.rs`: per-provider client credentials and token URL
//! - `client.rs`: refresh-token grant against the provider
//! - `token_manager.rs`: cached token with expiry, forced refresh
//!
//! The dispatcher only sees [`TokenSource`], so tests can hand it tokens
//! without an HTTP server.

pub mod client;
pub mod config;
pub mod token_manager;

use async_trait::async_trait;

use crate::utils::SyncError;

pub use client::{AccessToken, OAuth2Client, TokenResponse};
pub use config::OAuth2Config;
pub use token_manager::TokenManager;

/// Supplies bearer tokens for one provider
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn provider(&self) -> &str;

    /// Current token, refreshed only if the cached one expired
    async fn access_token(&self) -> Result<String, SyncError>;

    /// New token regardless of cache state; used after a 401
    async fn refresh(&self) -> Result<String, SyncError>;
}
