//! Zoom level to clustering distance mapping.

use std::fmt;
use std::sync::Arc;

/// Default cluster radius.
pub const DEFAULT_RADIUS: f64 = 15.0;

/// Maps a zoom level and radius to the epsilon passed to the density-based
/// clustering primitive.
///
/// Implementations must be total over `0..=max_zoom_level` and depend on
/// nothing but their two arguments. Higher zoom levels should yield smaller
/// distances so detailed views cluster less.
pub trait ZoomToDistance: Send + Sync {
    fn distance(&self, zoom_level: u8, radius: f64) -> f64;
}

/// `radius / 2^zoom_level`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalvingDistance;

impl ZoomToDistance for HalvingDistance {
    fn distance(&self, zoom_level: u8, radius: f64) -> f64 {
        radius / 2.0_f64.powi(i32::from(zoom_level))
    }
}

impl<F> ZoomToDistance for F
where
    F: Fn(u8, f64) -> f64 + Send + Sync,
{
    fn distance(&self, zoom_level: u8, radius: f64) -> f64 {
        self(zoom_level, radius)
    }
}

/// Shared handle to a distance strategy.
#[derive(Clone)]
pub struct DistanceFn(Arc<dyn ZoomToDistance>);

impl DistanceFn {
    pub fn new(strategy: impl ZoomToDistance + 'static) -> Self {
        Self(Arc::new(strategy))
    }

    pub fn distance(&self, zoom_level: u8, radius: f64) -> f64 {
        self.0.distance(zoom_level, radius)
    }
}

impl Default for DistanceFn {
    fn default() -> Self {
        Self::new(HalvingDistance)
    }
}

impl fmt::Debug for DistanceFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DistanceFn(..)")
    }
}
