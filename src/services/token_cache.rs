//! Management API token cache.
//!
//! Holds one client-credentials token with its expiry. The token is reused
//! until it gets within the grace period of expiring, then fetched again.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

/// The provider reported a lifetime that does not fit a timestamp
#[derive(Debug, Error, PartialEq, Eq)]
#[error("token lifetime of {0} seconds is out of range")]
pub struct InvalidTokenLifetime(pub i64);

/// Token as returned by the provider's token endpoint
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now()
            .checked_add_signed(grace_period)
            .map_or(true, |deadline| deadline >= self.expires_at)
    }
}

#[derive(Debug)]
pub struct ManagementTokenCache {
    cached: RwLock<Option<CachedToken>>,
    grace_period: Duration,
}

impl ManagementTokenCache {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            cached: RwLock::new(None),
            grace_period,
        }
    }

    /// Return the cached token, or run `fetch` and cache its result
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedToken, E>>,
        E: From<InvalidTokenLifetime>,
    {
        {
            let cache = self.cached.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(ref token) = *cache {
            if !token.is_expired(self.grace_period) {
                return Ok(token.access_token.clone());
            }
        }

        let fetched = fetch().await?;
        let expires_at = Duration::try_seconds(fetched.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(InvalidTokenLifetime(fetched.expires_in))?;
        tracing::debug!(
            "Acquired management token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        *cache = Some(CachedToken {
            access_token: fetched.access_token.clone(),
            expires_at,
        });
        Ok(fetched.access_token)
    }

    /// Forget the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl Default for ManagementTokenCache {
    fn default() -> Self {
        Self::new(Duration::seconds(60))
    }
}
