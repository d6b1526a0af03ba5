//! Expiring key-value store backing the token engine.
//!
//! Production runs against Redis; tests use the in-memory implementation
//! so the token lifecycle can be exercised without external services.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tokio::sync::Mutex;

/// Cache storage failure.
#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError(err.to_string())
    }
}

/// Expiring key-value operations the token engine needs.
///
/// Keys follow the `token:{type}:{user}:{session}` scheme;
/// `delete_pattern` accepts glob wildcards in the type and session
/// positions.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, with a
    /// time-to-live in seconds. The replace is a single atomic write.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Fetch the value stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove every key matching a glob pattern, returning how many
    /// keys were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Whether `key` is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete `key` only if its current value equals `expected`, as one
    /// atomic step. Returns `true` if the key was deleted. Two racing
    /// callers see exactly one `true`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError>;

    /// Liveness probe against the backing store.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Atomic compare-then-delete. GET and DEL must not interleave with a
/// concurrent writer, so both run inside one script invocation.
const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed cache using a multiplexed connection manager.
#[derive(Clone)]
pub struct RedisTokenCache {
    conn: ConnectionManager,
    compare_and_delete: Arc<Script>,
}

impl RedisTokenCache {
    /// Connect to Redis at `url` and build the cache.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            compare_and_delete: Arc::new(Script::new(COMPARE_AND_DELETE_SCRIPT)),
        })
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        // SCAN instead of KEYS so the server is not blocked on large
        // keyspaces.
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await?;
                removed += deleted;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

/// In-memory cache with lazy expiry, for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryTokenCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: std::time::Instant,
}

impl Entry {
    fn expired(&self) -> bool {
        std::time::Instant::now() >= self.expires_at
    }
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Glob match supporting `*` only, which is all the key scheme uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ends with '*', any remainder matches.
    true
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: std::time::Instant::now() + std::time::Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().await;
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        let removed = matching.len() as u64;
        for key in matching {
            entries.remove(&key);
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.expired() && entry.value == expected => {
                entries.remove(key);
                Ok(true)
            }
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_exact_and_wildcards() {
        assert!(glob_match("token:access:1:abc", "token:access:1:abc"));
        assert!(glob_match("token:*:1:abc", "token:access:1:abc"));
        assert!(glob_match("token:*:1:*", "token:refresh:1:xyz"));
        assert!(!glob_match("token:*:1:*", "token:refresh:2:xyz"));
        assert!(!glob_match("token:access:1:abc", "token:access:1:abcd"));
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let cache = InMemoryTokenCache::new();
        cache.put("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());
        cache.delete_pattern("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_replaces_existing_value() {
        let cache = InMemoryTokenCache::new();
        cache.put("k", "old", 60).await.unwrap();
        cache.put("k", "new", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let cache = InMemoryTokenCache::new();
        cache.put("k", "v", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn delete_pattern_removes_only_matches() {
        let cache = InMemoryTokenCache::new();
        cache.put("token:access:1:a", "x", 60).await.unwrap();
        cache.put("token:refresh:1:a", "y", 60).await.unwrap();
        cache.put("token:access:2:b", "z", 60).await.unwrap();
        let removed = cache.delete_pattern("token:*:1:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.exists("token:access:2:b").await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_delete_requires_matching_value() {
        let cache = InMemoryTokenCache::new();
        cache.put("k", "v1", 60).await.unwrap();
        assert!(!cache.compare_and_delete("k", "v2").await.unwrap());
        assert!(cache.exists("k").await.unwrap());
        assert!(cache.compare_and_delete("k", "v1").await.unwrap());
        assert!(!cache.compare_and_delete("k", "v1").await.unwrap());
    }
}
