//! Cache provider implementations.
//!
//! Each provider implements [`TileCache`](crate::cache::TileCache). The
//! variant is chosen once, when [`TileCacheService`](crate::cache::TileCacheService)
//! is built from a [`CacheConfig`](crate::config::CacheConfig).
//!
//! # Available Providers
//!
//! - [`DisabledCacheProvider`]: Always misses, never stores
//! - [`MemoryCacheProvider`]: In-process LRU cache using moka
//! - [`RemoteCacheProvider`]: Shared key-value store with TTL expiry

mod disabled;
mod memory;
mod remote;

pub use disabled::DisabledCacheProvider;
pub use memory::{MemoryCacheProvider, DEFAULT_MEMORY_CACHE_BYTES, DEFAULT_MEMORY_CACHE_TTL};
pub use remote::{KeyValueStore, RemoteCacheProvider, DEFAULT_REMOTE_TTL_SECS};

#[cfg(feature = "redis")]
pub use remote::RedisStore;
