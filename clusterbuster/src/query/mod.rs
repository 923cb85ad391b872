//! Hierarchical tile query compiler.
//!
//! Turns a tile request into one SQL statement that selects the points of
//! the tile, re-clusters them level by level from the deepest configured
//! zoom down to the requested one, and encodes the survivors as a vector
//! tile. Clustering, centroids and tile encoding run inside the database;
//! this module only composes the statement.

pub mod attributes;
pub mod base;
pub mod compiler;
pub mod distance;
pub mod params;
pub mod stage;
pub mod target;

pub use attributes::AttributeList;
pub use base::{BaseQueryBuilder, BaseQueryFn, DefaultBaseQuery};
pub use compiler::{CompiledQuery, PlanBranch, QueryCompiler, QueryPlan};
pub use distance::{DistanceFn, HalvingDistance, ZoomToDistance, DEFAULT_RADIUS};
pub use params::{FilterClause, QueryValue};
pub use stage::{BoundingBox, Stage};
pub use target::{ClusterSpec, Identifier, QueryTarget};

use thiserror::Error;

/// Errors raised while composing a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A table or column name is not a plain or schema-qualified identifier.
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The attribute set cannot be carried through the plan.
    #[error("unsupported attribute {name:?}: {reason}")]
    UnsupportedAttribute { name: String, reason: &'static str },

    /// The distance strategy returned an unusable epsilon.
    #[error("distance for zoom level {zoom_level} is {distance}, expected a finite non-negative value")]
    InvalidDistance { zoom_level: u8, distance: f64 },

    /// A filter clause references a value it does not carry.
    #[error("filter clause {clause:?} references ${index} but carries {available} value(s)")]
    FilterParameterOutOfRange {
        clause: String,
        index: usize,
        available: usize,
    },

    /// Tile extent must be positive.
    #[error("invalid tile extent: {0}")]
    InvalidExtent(u32),
}
