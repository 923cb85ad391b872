//! Cache service: one constructed backend plus the operations the tile
//! pipeline needs from it.
//!
//! The backend variant is selected once from [`CacheConfig`] and held as an
//! explicit object; there is no process-wide cache handle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::key::CacheKey;
use crate::cache::providers::{DisabledCacheProvider, MemoryCacheProvider};
use crate::cache::traits::{CacheError, CacheKind, TileCache};
use crate::cache::ttl::CacheTtl;
use crate::config::CacheConfig;
use crate::coord::{tiles_over_location, TileCoord, INVALIDATION_MAX_ZOOM};
use crate::query::FilterClause;

/// Shared handle to the configured cache backend.
#[derive(Clone)]
pub struct TileCacheService {
    cache: Arc<dyn TileCache>,
}

impl TileCacheService {
    pub fn new(cache: Arc<dyn TileCache>) -> Self {
        Self { cache }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCacheProvider))
    }

    /// Build the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` for a remote backend when the crate
    /// is built without the `redis` feature, or a connection error when the
    /// remote server cannot be reached.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache: Arc<dyn TileCache> = match config {
            CacheConfig::Disabled => Arc::new(DisabledCacheProvider),
            CacheConfig::Memory {
                max_size_bytes,
                time_to_live,
            } => Arc::new(MemoryCacheProvider::new(*max_size_bytes, *time_to_live)),
            CacheConfig::Remote { url, ttl_secs } => Self::connect_remote(url, *ttl_secs).await?,
        };

        info!(kind = %cache.kind(), "Tile cache ready");
        Ok(Self { cache })
    }

    #[cfg(feature = "redis")]
    async fn connect_remote(url: &str, ttl_secs: u64) -> Result<Arc<dyn TileCache>, CacheError> {
        use crate::cache::providers::RemoteCacheProvider;

        let provider =
            RemoteCacheProvider::connect_redis(url, Duration::from_secs(ttl_secs)).await?;
        Ok(Arc::new(provider))
    }

    #[cfg(not(feature = "redis"))]
    async fn connect_remote(_url: &str, _ttl_secs: u64) -> Result<Arc<dyn TileCache>, CacheError> {
        Err(CacheError::Unavailable("remote"))
    }

    pub fn kind(&self) -> CacheKind {
        self.cache.kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.kind() != CacheKind::Disabled
    }

    /// Derive the key for a request, or `None` when caching is disabled.
    ///
    /// `None` means the request is neither looked up nor stored.
    pub fn derive_key(
        &self,
        table: &str,
        tile: TileCoord,
        filters: &[FilterClause],
    ) -> Option<CacheKey> {
        self.is_enabled()
            .then(|| CacheKey::derive(table, tile, filters))
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        self.cache.get(key.as_str()).await
    }

    /// Store a payload. A `ttl_secs` of zero means backend default.
    pub async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl_secs: u64) -> Result<(), CacheError> {
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        self.cache.set(key.as_str(), value, ttl).await
    }

    /// Resolve the TTL, in seconds, for a tile at `zoom_level`.
    ///
    /// Returns 0 when the backend does not honour TTLs, whatever the
    /// override. Otherwise the override wins over the configured default.
    pub async fn resolve_ttl(&self, zoom_level: u8, ttl_override: Option<&CacheTtl>) -> u64 {
        if !self.cache.supports_ttl() {
            return 0;
        }
        match ttl_override {
            Some(ttl) => ttl.seconds_for(zoom_level).await,
            None => self
                .cache
                .default_ttl()
                .map(|ttl| ttl.as_secs())
                .unwrap_or(0),
        }
    }

    /// Remove every cached variant of one tile, whatever its filters.
    pub async fn invalidate_tile(&self, table: &str, tile: TileCoord) -> Result<u64, CacheError> {
        let removed = self
            .cache
            .invalidate_prefix(&CacheKey::tile_prefix(table, tile))
            .await?;
        debug!(table, tile = %tile, removed, "Invalidated tile");
        Ok(removed)
    }

    /// Remove every cached tile containing a location, zoom 0 through 21.
    pub async fn invalidate_location(
        &self,
        table: &str,
        lat: f64,
        lon: f64,
    ) -> Result<u64, CacheError> {
        let tiles = tiles_over_location(lat, lon, INVALIDATION_MAX_ZOOM)?;
        let mut removed = 0;
        for tile in tiles {
            removed += self.invalidate_tile(table, tile).await?;
        }
        info!(table, lat, lon, removed, "Invalidated tiles over location");
        Ok(removed)
    }
}

impl std::fmt::Debug for TileCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCacheService")
            .field("kind", &self.kind())
            .finish()
    }
}
