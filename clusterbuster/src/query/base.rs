//! Seeding statement of a plan.
//!
//! The base stage selects the tile's points and gives each one the columns
//! every later stage reads: `center`, `size`, `clusterNo`, `expansionZoom`
//! and the configured attributes. Deployments with unusual schemas can
//! replace it with their own [`BaseQueryBuilder`].

use std::fmt;
use std::sync::Arc;

use crate::query::stage::{BaseStage, TILE_SRID};

/// Renders the body of the base stage.
///
/// The returned SQL must project `center`, `size`, `clusterNo`,
/// `expansionZoom` and every attribute of `stage.attributes`, and should
/// only reference values through the placeholders carried by `stage`.
/// `stage.predicates` are already renumbered into the statement and must be
/// applied verbatim.
pub trait BaseQueryBuilder: Send + Sync {
    fn build(&self, stage: &BaseStage) -> String;
}

/// Points of the tile's bounding box, filtered by every predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBaseQuery;

impl BaseQueryBuilder for DefaultBaseQuery {
    fn build(&self, stage: &BaseStage) -> String {
        let mut sql = format!(
            "\nSELECT\n  {geometry} AS center,\n  1 AS size,\n  0 AS clusterNo,\n  {expansion} AS expansionZoom{attributes}\n\
             FROM {table}\n\
             WHERE\n  ST_Intersects({bbox}, ST_Transform({geometry}, {srid}))",
            geometry = stage.geometry,
            expansion = stage.expansion_zoom,
            attributes = stage.attributes.to_select(),
            table = stage.table,
            bbox = stage.bbox(),
            srid = TILE_SRID,
        );
        for predicate in &stage.predicates {
            sql.push_str(&format!("\n  AND ({})", predicate));
        }
        sql.push('\n');
        sql
    }
}

impl<F> BaseQueryBuilder for F
where
    F: Fn(&BaseStage) -> String + Send + Sync,
{
    fn build(&self, stage: &BaseStage) -> String {
        self(stage)
    }
}

/// Shared handle to a base query builder. Defaults to [`DefaultBaseQuery`].
#[derive(Clone, Default)]
pub struct BaseQueryFn(Option<Arc<dyn BaseQueryBuilder>>);

impl BaseQueryFn {
    pub fn new(builder: impl BaseQueryBuilder + 'static) -> Self {
        Self(Some(Arc::new(builder)))
    }

    pub fn is_default(&self) -> bool {
        self.0.is_none()
    }

    pub fn build(&self, stage: &BaseStage) -> String {
        match &self.0 {
            Some(builder) => builder.build(stage),
            None => DefaultBaseQuery.build(stage),
        }
    }
}

impl PartialEq for BaseQueryFn {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for BaseQueryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("BaseQueryFn(custom)"),
            None => f.write_str("BaseQueryFn(default)"),
        }
    }
}
