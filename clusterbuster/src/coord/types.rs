//! Tile coordinate types and validation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Highest zoom level accepted in a tile request.
pub const MAX_ZOOM: u8 = 24;

/// Errors raised while validating a tile address.
///
/// Raised before any query stage is built; a malformed coordinate never
/// reaches the compiler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// A coordinate component was not an integer.
    #[error("tile {component} is not an integer: {value:?}")]
    NotAnInteger {
        component: &'static str,
        value: String,
    },

    /// Zoom is negative or above [`MAX_ZOOM`].
    #[error("zoom level {0} is outside 0..={max}", max = MAX_ZOOM)]
    ZoomOutOfRange(i64),

    /// Column is outside `0..2^z`.
    #[error("tile x {x} is outside 0..{limit} at zoom {z}")]
    XOutOfRange { z: u8, x: i64, limit: u32 },

    /// Row is outside `0..2^z`.
    #[error("tile y {y} is outside 0..{limit} at zoom {z}")]
    YOutOfRange { z: u8, y: i64, limit: u32 },

    /// Latitude outside the Web Mercator range.
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180.
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),
}

/// A validated `(z, x, y)` tile address.
///
/// Construction guarantees `z <= MAX_ZOOM`, `x < 2^z` and `y < 2^z`, so a
/// `TileCoord` can be forwarded into query parameters without further checks.
///
/// # Example
///
/// ```
/// use clusterbuster::coord::TileCoord;
///
/// let tile = TileCoord::new(1, 0, 1).unwrap();
/// assert_eq!(tile.z(), 1);
/// assert!(TileCoord::new(1, 2, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    z: u8,
    x: u32,
    y: u32,
}

impl TileCoord {
    /// Validate and create a tile coordinate.
    pub fn new(z: i64, x: i64, y: i64) -> Result<Self, CoordError> {
        if !(0..=i64::from(MAX_ZOOM)).contains(&z) {
            return Err(CoordError::ZoomOutOfRange(z));
        }
        let z = z as u8;
        let limit = 1u32 << z;

        if !(0..i64::from(limit)).contains(&x) {
            return Err(CoordError::XOutOfRange { z, x, limit });
        }
        if !(0..i64::from(limit)).contains(&y) {
            return Err(CoordError::YOutOfRange { z, y, limit });
        }

        Ok(Self {
            z,
            x: x as u32,
            y: y as u32,
        })
    }

    /// Parse and validate a coordinate from its textual components, as they
    /// arrive from a URL path (`/{z}/{x}/{y}`).
    pub fn parse(z: &str, x: &str, y: &str) -> Result<Self, CoordError> {
        Self::new(
            parse_component("z", z)?,
            parse_component("x", x)?,
            parse_component("y", y)?,
        )
    }

    /// Zoom level.
    pub fn z(&self) -> u8 {
        self.z
    }

    /// Column.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Row.
    pub fn y(&self) -> u32 {
        self.y
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = CoordError;

    /// Parses `z/x/y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '/');
        let z = parts.next().unwrap_or_default();
        let x = parts.next().unwrap_or_default();
        let y = parts.next().unwrap_or_default();
        Self::parse(z, x, y)
    }
}

fn parse_component(component: &'static str, value: &str) -> Result<i64, CoordError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| CoordError::NotAnInteger {
            component,
            value: value.to_string(),
        })
}
