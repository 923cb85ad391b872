//! Render one tile against a PostGIS database.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use clusterbuster::pipeline::{gunzip, PgTileExecutor};
use clusterbuster::query::FilterClause;
use clusterbuster::server::{QueryParams, TileRequest, TileServer};
use clusterbuster::TileServerConfig;
use tracing::info;

use super::TileArgs;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub tile: TileArgs,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Write the tile here instead of reporting its size
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Write the decompressed tile
    #[arg(long)]
    pub decompress: bool,
}

pub async fn run(args: &RenderArgs, config: TileServerConfig) -> Result<(), CliError> {
    let config = args.tile.apply(config);
    let executor = Arc::new(PgTileExecutor::connect(&args.database_url, 2).await?);

    let filters: Vec<FilterClause> = args.tile.filter_clauses();
    let server: TileServer = TileServer::start(config, executor)
        .await?
        .with_filters(move |_: &QueryParams| filters.clone());

    let request = TileRequest::new(&args.tile.z, &args.tile.x, &args.tile.y)
        .with_request_id("cli");
    let compressed = server.render(&request).await?;

    let bytes = if args.decompress {
        gunzip(&compressed).map_err(|e| CliError::InvalidArgument(e.to_string()))?
    } else {
        compressed
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes).map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), bytes = bytes.len(), "Tile written");
        }
        None => println!("{} bytes", bytes.len()),
    }
    Ok(())
}
