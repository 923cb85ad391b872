//! Print the cache key of a tile.

use clusterbuster::cache::CacheKey;
use clusterbuster::coord::TileCoord;
use clusterbuster::TileServerConfig;

use super::TileArgs;
use crate::error::CliError;

pub fn run(args: &TileArgs, config: TileServerConfig) -> Result<(), CliError> {
    let config = args.apply(config);
    let tile = TileCoord::parse(&args.z, &args.x, &args.y)?;

    println!(
        "{}",
        CacheKey::derive(&config.table, tile, &args.filter_clauses())
    );
    Ok(())
}
