//! Tile cache.
//!
//! Compressed tiles are cached under a deterministic key derived from the
//! table, the tile address and the request's filter clauses. The backend is
//! chosen once from configuration:
//!
//! - **Disabled**: every request recomputes
//! - **Memory**: bounded in-process LRU with age-based expiry
//! - **Remote**: shared key-value store honouring per-entry TTLs
//!
//! Cache failures never fail a request; the pipeline logs them and carries
//! on as if the cache had missed.

pub mod key;
pub mod providers;
pub mod service;
pub mod traits;
pub mod ttl;

pub use key::{filters_digest, CacheKey};
pub use providers::{
    DisabledCacheProvider, KeyValueStore, MemoryCacheProvider, RemoteCacheProvider,
    DEFAULT_MEMORY_CACHE_BYTES, DEFAULT_MEMORY_CACHE_TTL, DEFAULT_REMOTE_TTL_SECS,
};
pub use service::TileCacheService;
pub use traits::{BoxFuture, CacheError, CacheKind, TileCache};
pub use ttl::CacheTtl;

#[cfg(feature = "redis")]
pub use providers::RedisStore;
