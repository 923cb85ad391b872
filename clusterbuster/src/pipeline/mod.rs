//! Tile generation pipeline pieces.
//!
//! - [`compress`]: gzip helpers for encoded tiles
//! - [`executor`]: the seam to the spatial database
//! - [`stages`]: cache lookup and store stages that never fail a request

pub mod compress;
pub mod executor;
pub mod stages;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use compress::{compress_tile, gunzip, gzip};
pub use executor::{ExecutorError, TileQueryExecutor};

#[cfg(feature = "postgres")]
pub use postgres::PgTileExecutor;
