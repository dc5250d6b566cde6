//! Token Manager
//!
//! Caches one access token per provider and refreshes it when it is about to
//! expire, or on demand after the API rejected it.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::client::AccessToken;
use super::{OAuth2Client, OAuth2Config, TokenSource};
use crate::utils::logging::*;
use crate::utils::SyncError;

/// Tokens are treated as expired this long before the provider says so
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
struct TokenCache {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl TokenCache {
    fn is_valid(&self) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => Instant::now() + EXPIRY_MARGIN < expires_at,
            _ => false,
        }
    }

    fn set(&mut self, token: AccessToken) {
        self.expires_at = Some(Instant::now() + Duration::from_secs(token.expires_in));
        self.token = Some(token.token);
    }

    fn clear(&mut self) {
        self.token = None;
        self.expires_at = None;
    }
}

pub struct TokenManager {
    oauth_client: OAuth2Client,
    cache: RwLock<TokenCache>,
}

impl TokenManager {
    pub fn new(config: OAuth2Config) -> Result<Self, SyncError> {
        Ok(Self {
            oauth_client: OAuth2Client::new(config)?,
            cache: RwLock::new(TokenCache::default()),
        })
    }

    /// Cached token, or a fresh one when the cache is empty or expiring
    pub async fn get_valid_token(&self) -> Result<String, SyncError> {
        {
            let cache = self.cache.read().await;
            if cache.is_valid() {
                if let Some(token) = &cache.token {
                    return Ok(token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock
        if cache.is_valid() {
            if let Some(token) = &cache.token {
                return Ok(token.clone());
            }
        }

        log_info(&format!(
            "🔄 [TokenManager] No valid {} token cached, refreshing",
            self.oauth_client.provider()
        ));
        let fresh = self.oauth_client.refresh_access_token().await?;
        let token = fresh.token.clone();
        cache.set(fresh);
        Ok(token)
    }

    /// Drops the cached token and fetches a new one
    pub async fn force_refresh(&self) -> Result<String, SyncError> {
        let mut cache = self.cache.write().await;
        cache.clear();

        let fresh = self.oauth_client.refresh_access_token().await?;
        let token = fresh.token.clone();
        cache.set(fresh);
        Ok(token)
    }

    pub async fn has_cached_token(&self) -> bool {
        self.cache.read().await.is_valid()
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    fn provider(&self) -> &str {
        self.oauth_client.provider()
    }

    async fn access_token(&self) -> Result<String, SyncError> {
        self.get_valid_token().await
    }

    async fn refresh(&self) -> Result<String, SyncError> {
        self.force_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn manager(token_url: String) -> TokenManager {
        TokenManager::new(OAuth2Config {
            provider: "google".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            token_url,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_token_cache_expiration() {
        let mut cache = TokenCache::default();
        assert!(!cache.is_valid());

        cache.set(AccessToken {
            token: "t".to_string(),
            expires_in: 3600,
        });
        assert!(cache.is_valid());

        // Inside the safety margin counts as expired
        cache.set(AccessToken {
            token: "t".to_string(),
            expires_in: 30,
        });
        assert!(!cache.is_valid());

        cache.clear();
        assert!(cache.token.is_none());
    }

    #[tokio::test]
    async fn test_token_is_cached_between_calls() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.first", "expires_in": 3599}));
            })
            .await;

        let manager = manager(server.url("/token"));
        assert_eq!(manager.access_token().await.unwrap(), "ya29.first");
        assert_eq!(manager.access_token().await.unwrap(), "ya29.first");
        assert!(manager.has_cached_token().await);

        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_always_hits_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.next", "expires_in": 3599}));
            })
            .await;

        let manager = manager(server.url("/token"));
        manager.access_token().await.unwrap();
        manager.refresh().await.unwrap();

        assert_eq!(mock.hits_async().await, 2);
        assert_eq!(manager.provider(), "google");
    }
}
