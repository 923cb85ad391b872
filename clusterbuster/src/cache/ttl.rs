//! Per-request cache TTL overrides.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::cache::traits::BoxFuture;

type SyncTtlFn = dyn Fn(u8) -> u64 + Send + Sync;
type AsyncTtlFn = dyn Fn(u8) -> BoxFuture<'static, u64> + Send + Sync;

/// TTL override, in seconds, as a literal or a function of the zoom level.
#[derive(Clone)]
pub enum CacheTtl {
    /// The same TTL for every zoom level.
    Seconds(u64),
    /// Computed synchronously from the zoom level.
    PerZoom(Arc<SyncTtlFn>),
    /// Computed asynchronously from the zoom level.
    PerZoomAsync(Arc<AsyncTtlFn>),
}

impl CacheTtl {
    pub fn per_zoom<F>(f: F) -> Self
    where
        F: Fn(u8) -> u64 + Send + Sync + 'static,
    {
        CacheTtl::PerZoom(Arc::new(f))
    }

    pub fn per_zoom_async<F, Fut>(f: F) -> Self
    where
        F: Fn(u8) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = u64> + Send + 'static,
    {
        CacheTtl::PerZoomAsync(Arc::new(move |zoom| -> BoxFuture<'static, u64> {
            Box::pin(f(zoom))
        }))
    }

    /// Evaluate the override for a zoom level.
    pub async fn seconds_for(&self, zoom_level: u8) -> u64 {
        match self {
            CacheTtl::Seconds(seconds) => *seconds,
            CacheTtl::PerZoom(f) => f(zoom_level),
            CacheTtl::PerZoomAsync(f) => f(zoom_level).await,
        }
    }
}

impl From<u64> for CacheTtl {
    fn from(seconds: u64) -> Self {
        CacheTtl::Seconds(seconds)
    }
}

impl fmt::Debug for CacheTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTtl::Seconds(seconds) => f.debug_tuple("Seconds").field(seconds).finish(),
            CacheTtl::PerZoom(_) => f.write_str("PerZoom(..)"),
            CacheTtl::PerZoomAsync(_) => f.write_str("PerZoomAsync(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_literal() {
        assert_eq!(CacheTtl::from(1800).seconds_for(0).await, 1800);
        assert_eq!(CacheTtl::Seconds(1800).seconds_for(14).await, 1800);
    }

    #[tokio::test]
    async fn test_per_zoom_table() {
        let table = [3600u64, 2400, 1800];
        let ttl = CacheTtl::per_zoom(move |zoom| table.get(usize::from(zoom)).copied().unwrap_or(0));

        assert_eq!(ttl.seconds_for(0).await, 3600);
        assert_eq!(ttl.seconds_for(1).await, 2400);
        assert_eq!(ttl.seconds_for(2).await, 1800);
        assert_eq!(ttl.seconds_for(5).await, 0);
    }

    #[tokio::test]
    async fn test_per_zoom_async() {
        let ttl = CacheTtl::per_zoom_async(|zoom| async move { 100 * u64::from(zoom) });
        assert_eq!(ttl.seconds_for(3).await, 300);
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", CacheTtl::Seconds(5)), "Seconds(5)");
        assert_eq!(format!("{:?}", CacheTtl::per_zoom(|_| 1)), "PerZoom(..)");
    }
}
