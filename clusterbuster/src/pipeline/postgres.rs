//! PostgreSQL/PostGIS executor over an sqlx connection pool.
//!
//! The database must provide the `TileBBox` and `TileDoubleBBox` helper
//! functions the compiled statements reference.

use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryScalar;
use sqlx::Postgres;
use tracing::debug;

use crate::cache::BoxFuture;
use crate::pipeline::executor::{ExecutorError, TileQueryExecutor};
use crate::query::{CompiledQuery, QueryValue};

/// Runs compiled tile statements against a PostGIS database.
#[derive(Debug, Clone)]
pub struct PgTileExecutor {
    pool: PgPool,
}

impl PgTileExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool of up to `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ExecutorError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: QueryScalar<'q, Postgres, Option<Vec<u8>>, PgArguments>,
    value: &'q QueryValue,
) -> QueryScalar<'q, Postgres, Option<Vec<u8>>, PgArguments> {
    match value {
        QueryValue::Int(v) => query.bind(*v),
        QueryValue::BigInt(v) => query.bind(*v),
        QueryValue::Float(v) => query.bind(*v),
        QueryValue::Text(v) => query.bind(v.as_str()),
        QueryValue::Bool(v) => query.bind(*v),
    }
}

impl TileQueryExecutor for PgTileExecutor {
    fn execute<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, Result<Vec<u8>, ExecutorError>> {
        Box::pin(async move {
            let statement = query
                .params
                .iter()
                .fold(sqlx::query_scalar(&query.sql), bind_value);

            let row: Option<Option<Vec<u8>>> = statement.fetch_optional(&self.pool).await?;
            let tile = row.ok_or(ExecutorError::NoRow)?.unwrap_or_default();

            debug!(bytes = tile.len(), "Tile statement executed");
            Ok(tile)
        })
    }
}
