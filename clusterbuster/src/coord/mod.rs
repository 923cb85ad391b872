//! Tile coordinate module
//!
//! Provides the validated `(z, x, y)` tile address used by every request,
//! plus conversion from geographic coordinates (latitude/longitude) to the
//! Web Mercator tile containing them.

mod types;

pub use types::{CoordError, TileCoord, MAX_LAT, MAX_ZOOM, MIN_LAT, MIN_LON};

use std::f64::consts::PI;

/// Highest zoom level swept when invalidating every tile over a location.
pub const INVALIDATION_MAX_ZOOM: u8 = 21;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=180.0).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::ZoomOutOfRange(i64::from(zoom)));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n as u32).saturating_sub(1);

    // lon = 180.0 lands exactly on n, clamp onto the last column
    let x = (((lon + 180.0) / 360.0 * n) as u32).min(max_index);

    let lat_rad = lat * PI / 180.0;
    let y = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32).min(max_index);

    TileCoord::new(i64::from(zoom), i64::from(x), i64::from(y))
}

/// Every tile containing the given location, from zoom 0 up to `max_zoom`.
pub fn tiles_over_location(lat: f64, lon: f64, max_zoom: u8) -> Result<Vec<TileCoord>, CoordError> {
    (0..=max_zoom.min(MAX_ZOOM))
        .map(|zoom| to_tile_coords(lat, lon, zoom))
        .collect()
}
