//! Compiles a tile request into a chained aggregation plan.
//!
//! Two branches, selected by the requested zoom:
//!
//! - **Unclustered** (`z >= max_zoom_level`): base stage → tile stage. Every
//!   feature has `count = 1` and `expansionZoom = max_zoom_level`.
//! - **Clustered** (`z < max_zoom_level`): base stage → one cluster/group
//!   pair per level from `max_zoom_level - 1` down to `z` → tile stage.
//!
//! Each stage reads only from the stage immediately before it.

use std::fmt;

use tracing::trace;

use crate::coord::TileCoord;
use crate::query::params::{FilterClause, ParamBinder, Placeholder, QueryValue, SqlType};
use crate::query::stage::{
    group_stage_name, BaseStage, BoundingBox, ClusterStage, GroupStage, Stage, TileParams,
    TileStage, BASE_STAGE, TILE_STAGE,
};
use crate::query::target::{ClusterSpec, Identifier, QueryTarget};
use crate::query::CompileError;

/// Which branch a plan was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanBranch {
    Unclustered,
    Clustered,
}

/// Compiler settings fixed per server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCompiler {
    /// Box used by the clustered branch's base stage. The unclustered branch
    /// always selects with the exact box.
    pub clustered_bounding_box: BoundingBox,
    /// Add `lng`/`lat` to each feature's attributes.
    pub include_lon_lat: bool,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self {
            clustered_bounding_box: BoundingBox::Exact,
            include_lon_lat: true,
        }
    }
}

impl QueryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clustered_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.clustered_bounding_box = bounding_box;
        self
    }

    pub fn with_lon_lat(mut self, include: bool) -> Self {
        self.include_lon_lat = include;
        self
    }

    /// Build the plan for one tile.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` for invalid identifiers, an unsupported
    /// attribute set, a zero extent, filter clauses referencing missing
    /// values, or a distance function yielding a non-finite or negative
    /// epsilon.
    pub fn compile(
        &self,
        tile: TileCoord,
        cluster: &ClusterSpec,
        target: &QueryTarget,
        filters: &[FilterClause],
    ) -> Result<QueryPlan, CompileError> {
        target.attributes.validate()?;
        let table = Identifier::parse(&target.table)?;
        let geometry = Identifier::parse(&target.geometry_column)?;
        if target.extent == 0 {
            return Err(CompileError::InvalidExtent(target.extent));
        }

        let max_zoom = cluster.max_zoom_level;
        let branch = if tile.z() >= max_zoom {
            PlanBranch::Unclustered
        } else {
            PlanBranch::Clustered
        };

        let mut binder = ParamBinder::new();
        let tile_params = TileParams {
            z: binder.bind(i32::from(tile.z()), SqlType::Integer),
            x: binder.bind(tile.x() as i64, SqlType::Integer),
            y: binder.bind(tile.y() as i64, SqlType::Integer),
        };

        let (bounding_box, base_expansion_zoom) = match branch {
            PlanBranch::Unclustered => (BoundingBox::Exact, i32::from(max_zoom)),
            PlanBranch::Clustered => (self.clustered_bounding_box, i32::from(max_zoom) + 1),
        };

        let expansion_zoom = binder.bind(base_expansion_zoom, SqlType::Integer);
        let predicates = filters
            .iter()
            .map(|clause| binder.bind_clause(clause))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stages = vec![Stage::Base(BaseStage {
            table,
            geometry,
            tile: tile_params,
            bounding_box,
            expansion_zoom,
            attributes: target.attributes.clone(),
            predicates,
            builder: target.base_query.clone(),
        })];

        let mut parent = BASE_STAGE.to_string();
        if branch == PlanBranch::Clustered {
            for level in (tile.z()..max_zoom).rev() {
                let epsilon = cluster.zoom_to_distance.distance(level, cluster.radius);
                if !epsilon.is_finite() || epsilon < 0.0 {
                    return Err(CompileError::InvalidDistance {
                        zoom_level: level,
                        distance: epsilon,
                    });
                }

                stages.push(Stage::Cluster(ClusterStage {
                    level,
                    parent: parent.clone(),
                    epsilon: binder.bind(epsilon, SqlType::Double),
                    attributes: target.attributes.clone(),
                }));
                stages.push(Stage::Group(GroupStage {
                    level,
                    merged_expansion_zoom: binder.bind(i32::from(level) + 1, SqlType::Integer),
                    attributes: target.attributes.clone(),
                }));
                parent = group_stage_name(level);
            }
        }

        let extent = binder.bind(target.extent as i64, SqlType::Integer);
        stages.push(Stage::Tile(TileStage {
            parent,
            tile: tile_params,
            extent,
            buffer_size: binder.bind(target.buffer_size as i64, SqlType::Integer),
            attributes: target.attributes.clone(),
            include_lon_lat: self.include_lon_lat,
        }));
        let source_layer = binder.bind(target.source_layer.as_str(), SqlType::Text);

        trace!(
            tile = %tile,
            branch = ?branch,
            stages = stages.len(),
            params = binder.len(),
            "Compiled tile plan"
        );

        Ok(QueryPlan {
            tile,
            branch,
            stages,
            source_layer,
            extent,
            params: binder.into_values(),
        })
    }
}

/// A compiled, immutable plan: named stages plus the final projection.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    tile: TileCoord,
    branch: PlanBranch,
    stages: Vec<Stage>,
    source_layer: Placeholder,
    extent: Placeholder,
    params: Vec<QueryValue>,
}

impl QueryPlan {
    pub fn tile(&self) -> TileCoord {
        self.tile
    }

    pub fn branch(&self) -> PlanBranch {
        self.branch
    }

    /// Stages in execution order: base, level pairs, tile.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of zoom levels aggregated (cluster/group pairs).
    pub fn level_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| matches!(stage, Stage::Group(_)))
            .count()
    }

    /// Zoom levels aggregated, deepest first.
    pub fn levels(&self) -> Vec<u8> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Group(group) => Some(group.level),
                _ => None,
            })
            .collect()
    }

    pub fn params(&self) -> &[QueryValue] {
        &self.params
    }

    /// Render to one executable statement plus its bound values.
    pub fn render(&self) -> CompiledQuery {
        let ctes: Vec<String> = self
            .stages
            .iter()
            .map(|stage| format!("{} AS ({})", stage.name(), stage.to_sql()))
            .collect();

        let sql = format!(
            "WITH {}\nSELECT ST_AsMVT({tile}, {layer}, {extent}, 'geom') AS mvt FROM {tile}",
            ctes.join(",\n"),
            tile = TILE_STAGE,
            layer = self.source_layer,
            extent = self.extent,
        );

        CompiledQuery {
            sql,
            params: self.params.clone(),
        }
    }
}

/// Statement text plus positional values, ready for an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryValue>,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sql)?;
        for (i, value) in self.params.iter().enumerate() {
            writeln!(f, "-- ${} = {}", i + 1, value)?;
        }
        Ok(())
    }
}
