//! Cache backend used when caching is turned off.

use std::time::Duration;

use crate::cache::traits::{BoxFuture, CacheError, CacheKind, TileCache};

/// Never stores anything and always misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCacheProvider;

impl TileCache for DisabledCacheProvider {
    fn kind(&self) -> CacheKind {
        CacheKind::Disabled
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        Box::pin(async { Ok(None) })
    }

    fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async { Ok(()) })
    }

    fn invalidate_prefix(&self, _prefix: &str) -> BoxFuture<'_, Result<u64, CacheError>> {
        Box::pin(async { Ok(0) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_set_misses() {
        let provider = DisabledCacheProvider;

        provider.set("key", vec![1, 2, 3], None).await.unwrap();
        provider
            .set("key", vec![1, 2, 3], Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(provider.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_not_ttl_capable() {
        let provider = DisabledCacheProvider;
        assert!(!provider.supports_ttl());
        assert_eq!(provider.default_ttl(), None);
        assert_eq!(provider.invalidate_prefix("key").await.unwrap(), 0);
    }
}
