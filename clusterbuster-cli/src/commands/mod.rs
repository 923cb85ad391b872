//! CLI subcommands.

pub mod key;
pub mod sql;

#[cfg(feature = "redis")]
pub mod invalidate;
#[cfg(feature = "postgres")]
pub mod tile;

use clap::Args;
use clusterbuster::query::{AttributeList, FilterClause};
use clusterbuster::TileServerConfig;

/// Tile address and query options shared by several commands.
#[derive(Debug, Args)]
pub struct TileArgs {
    /// Zoom level
    pub z: String,
    /// Tile column
    pub x: String,
    /// Tile row
    pub y: String,

    /// Table to tile (defaults to the configured table)
    #[arg(long)]
    pub table: Option<String>,

    /// Geometry column (defaults to the configured column)
    #[arg(long)]
    pub geometry: Option<String>,

    /// Vector tile layer name
    #[arg(long)]
    pub layer: Option<String>,

    /// Highest clustered zoom level
    #[arg(long)]
    pub max_zoom: Option<u8>,

    /// Cluster radius
    #[arg(long)]
    pub radius: Option<f64>,

    /// Comma-separated columns carried into each feature
    #[arg(long, value_delimiter = ',')]
    pub attributes: Vec<String>,

    /// SQL predicate added to the base selection (repeatable)
    #[arg(long = "filter")]
    pub filters: Vec<String>,
}

impl TileArgs {
    /// Apply command-line overrides on top of file configuration.
    pub fn apply(&self, mut config: TileServerConfig) -> TileServerConfig {
        if let Some(table) = &self.table {
            config.table = table.clone();
        }
        if let Some(geometry) = &self.geometry {
            config.geometry_column = geometry.clone();
        }
        if let Some(layer) = &self.layer {
            config.source_layer = layer.clone();
        }
        if let Some(max_zoom) = self.max_zoom {
            config.max_zoom_level = max_zoom;
        }
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        if !self.attributes.is_empty() {
            config.attributes = AttributeList::new(self.attributes.iter().map(|a| a.trim()));
        }
        config
    }

    pub fn filter_clauses(&self) -> Vec<FilterClause> {
        self.filters.iter().cloned().map(FilterClause::new).collect()
    }
}
