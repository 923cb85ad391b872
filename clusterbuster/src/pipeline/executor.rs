//! Query execution seam.
//!
//! The compiled statement runs in an external spatial database. Clustering,
//! centroids and tile encoding are database primitives; the executor only
//! ships the statement and its bound values and returns the encoded tile.

use thiserror::Error;

use crate::cache::BoxFuture;
use crate::query::CompiledQuery;

/// Errors reported by a query executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The database rejected or failed the statement.
    #[error("query failed: {0}")]
    Query(String),

    /// No connection could be obtained.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// The statement returned no row.
    #[error("query returned no tile row")]
    NoRow,

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Executes a compiled tile statement.
///
/// Implementations return the single encoded tile payload of the statement's
/// one result row. An empty tile is a valid, empty payload.
pub trait TileQueryExecutor: Send + Sync {
    fn execute<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, Result<Vec<u8>, ExecutorError>>;
}
