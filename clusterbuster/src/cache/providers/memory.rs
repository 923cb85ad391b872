//! In-memory cache provider using moka.
//!
//! Wraps `moka::future::Cache` for an async-safe, size-bounded cache with
//! automatic LRU eviction and an optional time-to-live applied to every
//! entry. Per-entry TTLs are not supported; the `ttl` passed to `set` is
//! ignored, and entries are never explicitly invalidated.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::cache::traits::{BoxFuture, CacheError, CacheKind, TileCache};

/// Default maximum weight: 64 MiB of keys plus payloads.
pub const DEFAULT_MEMORY_CACHE_BYTES: u64 = 64 * 1024 * 1024;

/// Default entry lifetime: one hour.
pub const DEFAULT_MEMORY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// In-memory cache provider using moka.
pub struct MemoryCacheProvider {
    cache: MokaCache<String, Vec<u8>>,
    max_size_bytes: u64,
}

impl MemoryCacheProvider {
    /// Create a new memory cache provider.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum total weight (key length + payload length)
    /// * `time_to_live` - Optional lifetime applied to every entry
    pub fn new(max_size_bytes: u64, time_to_live: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder()
            .weigher(|key: &String, value: &Vec<u8>| -> u32 {
                // moka uses u32 for weights, cap at u32::MAX for very large entries
                (key.len() + value.len()).min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes);

        if let Some(ttl) = time_to_live {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
            max_size_bytes,
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Weighted size of all entries.
    ///
    /// moka is eventually consistent; call `run_pending_tasks` first for an
    /// exact figure.
    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Run pending eviction and expiry work.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryCacheProvider {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES, Some(DEFAULT_MEMORY_CACHE_TTL))
    }
}

impl TileCache for MemoryCacheProvider {
    fn kind(&self) -> CacheKind {
        CacheKind::Memory
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'_, Result<(), CacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.cache.insert(key, value).await;
            Ok(())
        })
    }

    fn invalidate_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<u64, CacheError>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            debug!(prefix = %prefix, "Memory cache does not support invalidation, entries expire instead");
            Ok(0)
        })
    }
}
