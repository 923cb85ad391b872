//! Remote key-value cache provider.
//!
//! Entries live in an external store shared by every server instance and
//! expire by TTL. The store itself sits behind [`KeyValueStore`] so the
//! provider can be exercised without a running server; [`RedisStore`] is the
//! production client (feature `redis`).

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::traits::{BoxFuture, CacheError, CacheKind, TileCache};

/// Default remote entry lifetime: one day.
pub const DEFAULT_REMOTE_TTL_SECS: u64 = 86_400;

/// Minimal client contract for a remote key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>>;

    /// Store `value`, expiring after `ttl_secs` when given.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: Option<u64>,
    ) -> BoxFuture<'_, Result<(), CacheError>>;

    fn keys_with_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, CacheError>>;

    /// Delete keys, returning how many existed.
    fn delete(&self, keys: Vec<String>) -> BoxFuture<'_, Result<u64, CacheError>>;
}

/// TTL-capable cache provider over a [`KeyValueStore`].
pub struct RemoteCacheProvider {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl RemoteCacheProvider {
    pub fn new(store: Arc<dyn KeyValueStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Connect to a Redis server.
    #[cfg(feature = "redis")]
    pub async fn connect_redis(url: &str, default_ttl: Duration) -> Result<Self, CacheError> {
        let store = RedisStore::connect(url).await?;
        Ok(Self::new(Arc::new(store), default_ttl))
    }
}

impl TileCache for RemoteCacheProvider {
    fn kind(&self) -> CacheKind {
        CacheKind::Remote
    }

    fn supports_ttl(&self) -> bool {
        true
    }

    fn default_ttl(&self) -> Option<Duration> {
        Some(self.default_ttl)
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let key = key.to_string();
        Box::pin(async move { self.store.get(&key).await })
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'_, Result<(), CacheError>> {
        let key = key.to_string();
        let ttl = ttl
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.default_ttl)
            .as_secs();
        Box::pin(async move {
            let ttl_secs = (ttl > 0).then_some(ttl);
            self.store.set(&key, value, ttl_secs).await
        })
    }

    fn invalidate_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<u64, CacheError>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let keys = self.store.keys_with_prefix(&prefix).await?;
            if keys.is_empty() {
                return Ok(0);
            }
            let matched = keys.len();
            let removed = self.store.delete(keys).await?;
            debug!(prefix = %prefix, matched, removed, "Invalidated remote cache entries");
            Ok(removed)
        })
    }
}

/// Escape glob metacharacters so a prefix matches literally in `KEYS`.
#[cfg_attr(not(feature = "redis"), allow(dead_code))]
fn glob_pattern_for_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisStore;

#[cfg(feature = "redis")]
mod redis_store {
    use redis::aio::MultiplexedConnection;
    use redis::AsyncCommands;

    use super::{glob_pattern_for_prefix, KeyValueStore};
    use crate::cache::traits::{BoxFuture, CacheError};

    /// Redis client over a multiplexed connection.
    ///
    /// The connection is cheap to clone and safe to share; each command
    /// runs on its own clone.
    #[derive(Clone)]
    pub struct RedisStore {
        connection: MultiplexedConnection,
    }

    impl RedisStore {
        pub async fn connect(url: &str) -> Result<Self, CacheError> {
            let client = redis::Client::open(url)?;
            let connection = client.get_multiplexed_async_connection().await?;
            Ok(Self { connection })
        }
    }

    impl KeyValueStore for RedisStore {
        fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
            let key = key.to_string();
            let mut conn = self.connection.clone();
            Box::pin(async move {
                let value: Option<Vec<u8>> = conn.get(key).await?;
                Ok(value)
            })
        }

        fn set(
            &self,
            key: &str,
            value: Vec<u8>,
            ttl_secs: Option<u64>,
        ) -> BoxFuture<'_, Result<(), CacheError>> {
            let key = key.to_string();
            let mut conn = self.connection.clone();
            Box::pin(async move {
                match ttl_secs {
                    Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await?,
                    None => conn.set::<_, _, ()>(key, value).await?,
                }
                Ok(())
            })
        }

        fn keys_with_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, CacheError>> {
            let pattern = glob_pattern_for_prefix(prefix);
            let mut conn = self.connection.clone();
            Box::pin(async move {
                let keys: Vec<String> = conn.keys(pattern).await?;
                Ok(keys)
            })
        }

        fn delete(&self, keys: Vec<String>) -> BoxFuture<'_, Result<u64, CacheError>> {
            let mut conn = self.connection.clone();
            Box::pin(async move {
                if keys.is_empty() {
                    return Ok(0);
                }
                let removed: u64 = conn.del(keys).await?;
                Ok(removed)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory stand-in for a remote store, recording TTLs.
    #[derive(Default)]
    struct MockStore {
        entries: Mutex<HashMap<String, (Vec<u8>, Option<u64>)>>,
        failing: AtomicBool,
    }

    impl MockStore {
        fn check(&self) -> Result<(), CacheError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(CacheError::Backend("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn ttl_of(&self, key: &str) -> Option<Option<u64>> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }
    }

    impl KeyValueStore for MockStore {
        fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
            let key = key.to_string();
            Box::pin(async move {
                self.check()?;
                Ok(self.entries.lock().unwrap().get(&key).map(|(v, _)| v.clone()))
            })
        }

        fn set(
            &self,
            key: &str,
            value: Vec<u8>,
            ttl_secs: Option<u64>,
        ) -> BoxFuture<'_, Result<(), CacheError>> {
            let key = key.to_string();
            Box::pin(async move {
                self.check()?;
                self.entries.lock().unwrap().insert(key, (value, ttl_secs));
                Ok(())
            })
        }

        fn keys_with_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, CacheError>> {
            let prefix = prefix.to_string();
            Box::pin(async move {
                self.check()?;
                Ok(self
                    .entries
                    .lock()
                    .unwrap()
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect())
            })
        }

        fn delete(&self, keys: Vec<String>) -> BoxFuture<'_, Result<u64, CacheError>> {
            Box::pin(async move {
                self.check()?;
                let mut entries = self.entries.lock().unwrap();
                Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64)
            })
        }
    }

    fn provider() -> (Arc<MockStore>, RemoteCacheProvider) {
        let store = Arc::new(MockStore::default());
        let provider = RemoteCacheProvider::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Duration::from_secs(DEFAULT_REMOTE_TTL_SECS),
        );
        (store, provider)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_, provider) = provider();
        provider.set("t-1-0-0-abc", vec![1, 2], None).await.unwrap();
        assert_eq!(provider.get("t-1-0-0-abc").await.unwrap(), Some(vec![1, 2]));
        assert!(provider.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_ttl_is_honoured() {
        let (store, provider) = provider();
        provider
            .set("k", vec![1], Some(Duration::from_secs(1800)))
            .await
            .unwrap();
        assert_eq!(store.ttl_of("k"), Some(Some(1800)));
    }

    #[tokio::test]
    async fn test_missing_or_zero_ttl_uses_default() {
        let (store, provider) = provider();
        provider.set("a", vec![1], None).await.unwrap();
        provider.set("b", vec![1], Some(Duration::ZERO)).await.unwrap();

        assert_eq!(store.ttl_of("a"), Some(Some(86_400)));
        assert_eq!(store.ttl_of("b"), Some(Some(86_400)));
    }

    #[tokio::test]
    async fn test_zero_default_stores_without_expiry() {
        let store = Arc::new(MockStore::default());
        let provider =
            RemoteCacheProvider::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, Duration::ZERO);
        provider.set("a", vec![1], None).await.unwrap();
        assert_eq!(store.ttl_of("a"), Some(None));
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let (_, provider) = provider();
        provider.set("t-3-1-1-aaa", vec![1], None).await.unwrap();
        provider.set("t-3-1-1-bbb", vec![1], None).await.unwrap();
        provider.set("t-3-1-2-aaa", vec![1], None).await.unwrap();

        assert_eq!(provider.invalidate_prefix("t-3-1-1-").await.unwrap(), 2);
        assert!(provider.get("t-3-1-1-aaa").await.unwrap().is_none());
        assert!(provider.get("t-3-1-2-aaa").await.unwrap().is_some());
        assert_eq!(provider.invalidate_prefix("t-9-").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let (store, provider) = provider();
        store.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            provider.get("k").await,
            Err(CacheError::Backend(_))
        ));
    }

    #[test]
    fn test_provider_is_ttl_capable() {
        let (_, provider) = provider();
        assert!(provider.supports_ttl());
        assert_eq!(provider.kind(), CacheKind::Remote);
        assert_eq!(provider.default_ttl(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_glob_pattern_escapes_metacharacters() {
        assert_eq!(glob_pattern_for_prefix("t-1-0-0-"), "t-1-0-0-*");
        assert_eq!(glob_pattern_for_prefix("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }
}
