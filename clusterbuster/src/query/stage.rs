//! Typed stage descriptors and their SQL rendering.
//!
//! A compiled plan is a chain of common table expressions. Each descriptor
//! here holds identifiers, pre-rendered attribute fragments and parameter
//! placeholders; none of them holds a caller-supplied literal.

use crate::query::attributes::AttributeList;
use crate::query::base::BaseQueryFn;
use crate::query::params::Placeholder;
use crate::query::target::Identifier;

/// SRID of the tiling scheme's projected coordinate system.
pub const TILE_SRID: u32 = 3857;

/// SRID used for the longitude/latitude attributes.
pub const LON_LAT_SRID: u32 = 4326;

/// Name of the seeding stage.
pub const BASE_STAGE: &str = "base_query";

/// Name of the terminal stage consumed by the final projection.
pub const TILE_STAGE: &str = "tile";

/// Name of the cluster assignment stage at `level`.
pub fn cluster_stage_name(level: u8) -> String {
    format!("clustered_{}", level)
}

/// Name of the group aggregation stage at `level`.
pub fn group_stage_name(level: u8) -> String {
    format!("grouped_clusters_{}", level)
}

/// Which helper builds the tile's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundingBox {
    /// The tile's own envelope (`TileBBox`).
    #[default]
    Exact,
    /// Twice the tile's envelope (`TileDoubleBBox`), keeping clusters that
    /// straddle the tile edge.
    Widened,
}

impl BoundingBox {
    fn function(self) -> &'static str {
        match self {
            BoundingBox::Exact => "TileBBox",
            BoundingBox::Widened => "TileDoubleBBox",
        }
    }
}

/// Tile address placeholders, bound once and shared by every stage.
#[derive(Debug, Clone, Copy)]
pub struct TileParams {
    pub z: Placeholder,
    pub x: Placeholder,
    pub y: Placeholder,
}

impl TileParams {
    fn bbox(&self, bounding_box: BoundingBox) -> String {
        format!(
            "{}({}, {}, {}, {})",
            bounding_box.function(),
            self.z,
            self.x,
            self.y,
            TILE_SRID
        )
    }
}

/// Filtered selection of the points intersecting the tile.
#[derive(Debug, Clone)]
pub struct BaseStage {
    pub table: Identifier,
    pub geometry: Identifier,
    pub tile: TileParams,
    pub bounding_box: BoundingBox,
    /// Initial expansion zoom of every selected point.
    pub expansion_zoom: Placeholder,
    pub attributes: AttributeList,
    /// Filter predicates, already renumbered into the statement.
    pub predicates: Vec<String>,
    /// Renders this stage's body.
    pub builder: BaseQueryFn,
}

impl BaseStage {
    /// The selection box, e.g. `TileBBox($1::integer, $2::integer, $3::integer, 3857)`.
    pub fn bbox(&self) -> String {
        self.tile.bbox(self.bounding_box)
    }
}

/// Density-based cluster assignment at one zoom level.
#[derive(Debug, Clone)]
pub struct ClusterStage {
    pub level: u8,
    pub parent: String,
    pub epsilon: Placeholder,
    pub attributes: AttributeList,
}

/// Folds the rows of one cluster assignment into one row per cluster.
#[derive(Debug, Clone)]
pub struct GroupStage {
    pub level: u8,
    /// Expansion zoom given to groups that merged at this level (`level + 1`).
    pub merged_expansion_zoom: Placeholder,
    pub attributes: AttributeList,
}

/// Reprojection into tile space plus per-feature attributes.
#[derive(Debug, Clone)]
pub struct TileStage {
    pub parent: String,
    pub tile: TileParams,
    pub extent: Placeholder,
    pub buffer_size: Placeholder,
    pub attributes: AttributeList,
    /// Whether `lng`/`lat` are added to the feature attributes.
    pub include_lon_lat: bool,
}

/// One stage of a plan.
#[derive(Debug, Clone)]
pub enum Stage {
    Base(BaseStage),
    Cluster(ClusterStage),
    Group(GroupStage),
    Tile(TileStage),
}

impl Stage {
    /// CTE name of this stage.
    pub fn name(&self) -> String {
        match self {
            Stage::Base(_) => BASE_STAGE.to_string(),
            Stage::Cluster(stage) => cluster_stage_name(stage.level),
            Stage::Group(stage) => group_stage_name(stage.level),
            Stage::Tile(_) => TILE_STAGE.to_string(),
        }
    }

    /// Name of the stage this one reads from, if any.
    pub fn parent(&self) -> Option<String> {
        match self {
            Stage::Base(_) => None,
            Stage::Cluster(stage) => Some(stage.parent.clone()),
            Stage::Group(stage) => Some(cluster_stage_name(stage.level)),
            Stage::Tile(stage) => Some(stage.parent.clone()),
        }
    }

    /// Body of the stage's CTE.
    pub fn to_sql(&self) -> String {
        match self {
            Stage::Base(stage) => stage.builder.build(stage),
            Stage::Cluster(stage) => render_cluster(stage),
            Stage::Group(stage) => render_group(stage),
            Stage::Tile(stage) => render_tile(stage),
        }
    }
}

fn render_cluster(stage: &ClusterStage) -> String {
    format!(
        "\nSELECT\n  center,\n  expansionZoom,\n  clusterNo AS previousClusterNo,\n  size,\n  \
         ST_ClusterDBSCAN(center, {epsilon}, 1) OVER () AS clusters{attributes}\n\
         FROM {parent}\n",
        epsilon = stage.epsilon,
        attributes = stage.attributes.to_select(),
        parent = stage.parent,
    )
}

fn render_group(stage: &GroupStage) -> String {
    format!(
        "\nSELECT\n  SUM(size) AS size,\n  clusters AS clusterNo,\n  (\n    CASE COUNT(previousClusterNo)\n      \
         WHEN 1 THEN FIRST(expansionZoom)\n      ELSE {merged} END\n  ) AS expansionZoom{attributes},\n  \
         ST_Centroid(ST_Collect(center)) AS center\n\
         FROM {parent}\n\
         GROUP BY clusters\n",
        merged = stage.merged_expansion_zoom,
        attributes = stage.attributes.to_first_values(),
        parent = cluster_stage_name(stage.level),
    )
}

fn render_tile(stage: &TileStage) -> String {
    let bbox = stage.tile.bbox(BoundingBox::Exact);
    let lon_lat = if stage.include_lon_lat {
        format!(
            ",\n    'lng', ST_X(ST_Transform(center, {srid})),\n    'lat', ST_Y(ST_Transform(center, {srid}))",
            srid = LON_LAT_SRID
        )
    } else {
        String::new()
    };

    format!(
        "\nSELECT\n  ST_AsMVTGeom(ST_Transform(center, {srid}), {bbox}, {extent}, {buffer}, false) AS geom,\n  \
         jsonb_build_object(\n    'count', size,\n    'expansionZoom', expansionZoom{lon_lat}{attributes}\n  ) AS attributes\n\
         FROM {parent}\n\
         WHERE\n  ST_Intersects({bbox}, ST_Transform(center, {srid}))\n",
        srid = TILE_SRID,
        extent = stage.extent,
        buffer = stage.buffer_size,
        attributes = stage.attributes.to_json_pairs(),
        parent = stage.parent,
    )
}
