//! Cache stages - look up and store compressed tiles.
//!
//! Both stages swallow backend failures. A failed lookup is treated as a
//! miss and a failed store leaves the tile uncached; either way the request
//! continues.

use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, TileCacheService};

/// Checks the cache for a compressed tile.
///
/// Returns `None` on a miss, when caching is disabled (`key` is `None`),
/// or when the backend fails.
#[instrument(skip(cache), fields(request_id = %request_id))]
pub async fn check_cache(
    request_id: &str,
    key: Option<&CacheKey>,
    cache: &TileCacheService,
) -> Option<Vec<u8>> {
    let key = key?;

    match cache.get(key).await {
        Ok(Some(data)) => {
            debug!(key = %key, size_bytes = data.len(), "Cache hit");
            Some(data)
        }
        Ok(None) => {
            debug!(key = %key, "Cache miss");
            None
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Cache lookup failed, recomputing tile");
            None
        }
    }
}

/// Stores a compressed tile.
///
/// Returns whether the tile was stored. Never fails.
#[instrument(skip(data, cache), fields(request_id = %request_id))]
pub async fn store_cache(
    request_id: &str,
    key: Option<&CacheKey>,
    data: &[u8],
    ttl_secs: u64,
    cache: &TileCacheService,
) -> bool {
    let Some(key) = key else {
        return false;
    };

    match cache.set(key, data.to_vec(), ttl_secs).await {
        Ok(()) => {
            debug!(key = %key, size_bytes = data.len(), ttl_secs, "Tile cached");
            true
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Cache store failed, tile not cached");
            false
        }
    }
}
