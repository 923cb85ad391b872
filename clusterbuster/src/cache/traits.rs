//! Core traits for tile cache backends.
//!
//! The `TileCache` trait provides a key-value interface over compressed
//! tile payloads. Every backend (disabled, in-memory, remote) implements
//! it, and the rest of the crate only sees `Arc<dyn TileCache>`.
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable for debugging (`table-z-x-y-digest`)
//! - **Vec<u8> values**: Compressed tile bytes, no serialization imposed
//! - **Advisory TTL**: Backends without expiry support ignore it
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` for trait object support

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::coord::CoordError;

/// Errors that can occur during cache operations.
///
/// A missing key is never an error; these signal a genuine backend failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote store could not be reached or rejected the command.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A location could not be mapped to tiles for invalidation.
    #[error("invalid location: {0}")]
    Location(#[from] CoordError),

    /// The configured backend is not available in this build.
    #[error("cache backend {0} is not available in this build")]
    Unavailable(&'static str),

    /// Redis client error.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend variant, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Disabled,
    Memory,
    Remote,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::Disabled => "disabled",
            CacheKind::Memory => "memory",
            CacheKind::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// Key-value storage for compressed tiles.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; internal synchronization is
/// the backend's responsibility.
pub trait TileCache: Send + Sync {
    /// Which variant this backend is.
    fn kind(&self) -> CacheKind;

    /// Whether `set` honours a TTL.
    fn supports_ttl(&self) -> bool {
        false
    }

    /// TTL applied when the caller supplies none, for TTL-capable backends.
    fn default_ttl(&self) -> Option<Duration> {
        None
    }

    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` on backend failure
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>>;

    /// Store a value.
    ///
    /// `ttl` is advisory: `None` or a zero duration means backend default.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    ///
    /// Backends without explicit invalidation report zero.
    fn invalidate_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<u64, CacheError>>;
}
