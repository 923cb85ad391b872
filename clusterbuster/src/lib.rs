//! Clusterbuster - pre-clustered vector tiles for point data in PostGIS
//!
//! For each requested `z/x/y` tile this library compiles one SQL statement
//! that selects the tile's points and folds them into clusters level by
//! level, from the deepest clustered zoom down to the requested one. The
//! database does the spatial work and returns a Mapbox Vector Tile; the
//! library gzips it and caches it under a key derived from the tile and the
//! request's filters.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use clusterbuster::config::{CacheConfig, TileServerConfig};
//! use clusterbuster::pipeline::PgTileExecutor;
//! use clusterbuster::server::{TileRequest, TileServer};
//!
//! let executor = Arc::new(PgTileExecutor::connect("postgres://localhost/gis", 8).await?);
//! let config = TileServerConfig::default()
//!     .with_max_zoom_level(14)
//!     .with_cache(CacheConfig::memory());
//! let server: TileServer = TileServer::start(config, executor).await?;
//!
//! let tile = server
//!     .render(&TileRequest::new(3, 4, 2).with_table("public.stations"))
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod pipeline;
pub mod query;
pub mod server;

pub use config::{CacheConfig, ConfigFile, TileServerConfig};
pub use server::{FiltersToPredicates, TileError, TileRequest, TileServer};
