//! Revocation blacklist for tokens that must die before their signed
//! expiry, such as a rotated-out refresh token.
//!
//! Entries live under `token:blacklist:{token}` with a TTL equal to the
//! token's remaining lifetime, so the store cleans itself up.

use std::sync::Arc;

use crate::cache::TokenCache;
use crate::error::AppResult;

fn blacklist_key(token: &str) -> String {
    format!("token:blacklist:{token}")
}

/// Self-expiring set of revoked tokens.
#[derive(Clone)]
pub struct Blacklist {
    cache: Arc<dyn TokenCache>,
}

impl Blacklist {
    pub fn new(cache: Arc<dyn TokenCache>) -> Self {
        Self { cache }
    }

    /// Blacklist a token until its signed expiry (`exp`, a UTC Unix
    /// timestamp). A token that is already past expiry is not stored;
    /// ordinary expiry checks reject it anyway.
    pub async fn add(&self, token: &str, exp: i64) -> AppResult<()> {
        let remaining = exp - chrono::Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(());
        }
        self.cache
            .put(&blacklist_key(token), "revoked", remaining as u64)
            .await?;
        Ok(())
    }

    /// Whether the token has been blacklisted and is not yet expired.
    pub async fn contains(&self, token: &str) -> AppResult<bool> {
        Ok(self.cache.exists(&blacklist_key(token)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryTokenCache;

    #[tokio::test]
    async fn add_then_contains() {
        let blacklist = Blacklist::new(Arc::new(InMemoryTokenCache::new()));
        let exp = chrono::Utc::now().timestamp() + 600;

        assert!(!blacklist.contains("tok-a").await.unwrap());
        blacklist.add("tok-a", exp).await.unwrap();
        assert!(blacklist.contains("tok-a").await.unwrap());
        assert!(!blacklist.contains("tok-b").await.unwrap());
    }

    #[tokio::test]
    async fn already_expired_token_is_not_stored() {
        let blacklist = Blacklist::new(Arc::new(InMemoryTokenCache::new()));
        let exp = chrono::Utc::now().timestamp() - 60;

        blacklist.add("stale", exp).await.unwrap();
        assert!(!blacklist.contains("stale").await.unwrap());
    }
}
