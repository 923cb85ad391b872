//! CLI error type.

use clusterbuster::cache::CacheError;
use clusterbuster::config::ConfigError;
use clusterbuster::coord::CoordError;
use clusterbuster::query::CompileError;
use clusterbuster::TileError;
use thiserror::Error;

/// Errors surfaced to the operator. Each exits with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Coord(#[from] CoordError),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Tile(#[from] TileError),

    #[cfg(feature = "postgres")]
    #[error("failed to write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(any(feature = "postgres", feature = "redis"))]
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] clusterbuster::pipeline::ExecutorError),
}
