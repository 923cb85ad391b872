//! What is being tiled and how it is clustered.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::query::attributes::AttributeList;
use crate::query::base::BaseQueryFn;
use crate::query::distance::{DistanceFn, DEFAULT_RADIUS};
use crate::query::CompileError;

/// Default tiled table.
pub const DEFAULT_TABLE: &str = "public.points";

/// Default geometry column.
pub const DEFAULT_GEOMETRY: &str = "wkb_geometry";

/// Default vector tile layer name.
pub const DEFAULT_SOURCE_LAYER: &str = "points";

/// Default tile extent, in the vector tile's integer grid units.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Default buffer around the extent, in grid units.
pub const DEFAULT_BUFFER_SIZE: u32 = 256;

/// Default highest clustered zoom level.
pub const DEFAULT_MAX_ZOOM_LEVEL: u8 = 12;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$")
            .expect("identifier pattern is valid")
    })
}

/// A plain or schema-qualified SQL identifier (`points`, `public.points`).
///
/// Table and column names cannot be bound as parameters, so they are
/// checked against identifier syntax before they reach statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> Result<Self, CompileError> {
        if identifier_pattern().is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(CompileError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the data being tiled and the shape of the output tile.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTarget {
    pub table: String,
    pub geometry_column: String,
    pub source_layer: String,
    pub extent: u32,
    pub buffer_size: u32,
    pub attributes: AttributeList,
    /// Builder of the seeding statement.
    pub base_query: BaseQueryFn,
}

impl Default for QueryTarget {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            geometry_column: DEFAULT_GEOMETRY.to_string(),
            source_layer: DEFAULT_SOURCE_LAYER.to_string(),
            extent: DEFAULT_EXTENT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            attributes: AttributeList::default(),
            base_query: BaseQueryFn::default(),
        }
    }
}

impl QueryTarget {
    /// Create a target for a table, with default geometry column and layer.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = column.into();
        self
    }

    pub fn with_source_layer(mut self, layer: impl Into<String>) -> Self {
        self.source_layer = layer.into();
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeList) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_base_query(mut self, base_query: BaseQueryFn) -> Self {
        self.base_query = base_query;
        self
    }
}

/// Governs how many aggregation levels are synthesized and how aggressively
/// points merge at each level.
#[derive(Debug, Clone)]
pub struct ClusterSpec {
    pub max_zoom_level: u8,
    pub radius: f64,
    pub zoom_to_distance: DistanceFn,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            max_zoom_level: DEFAULT_MAX_ZOOM_LEVEL,
            radius: DEFAULT_RADIUS,
            zoom_to_distance: DistanceFn::default(),
        }
    }
}

impl ClusterSpec {
    pub fn new(max_zoom_level: u8, radius: f64) -> Self {
        Self {
            max_zoom_level,
            radius,
            zoom_to_distance: DistanceFn::default(),
        }
    }

    pub fn with_zoom_to_distance(mut self, zoom_to_distance: DistanceFn) -> Self {
        self.zoom_to_distance = zoom_to_distance;
        self
    }
}
