//! Invalidate cached tiles in the remote cache.

use clap::Args;
use clusterbuster::cache::TileCacheService;
use clusterbuster::coord::TileCoord;
use clusterbuster::{CacheConfig, TileServerConfig};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct InvalidateArgs {
    /// Table whose tiles are invalidated (defaults to the configured table)
    #[arg(long)]
    pub table: Option<String>,

    /// One tile, as z/x/y
    #[arg(long, conflicts_with = "location", required_unless_present = "location")]
    pub tile: Option<TileCoord>,

    /// Every tile over a point, as lat,lon
    #[arg(long, value_parser = parse_location)]
    pub location: Option<Location>,
}

/// A point given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

fn parse_location(value: &str) -> Result<Location, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lon, got {:?}", value))?;
    Ok(Location {
        lat: lat.trim().parse().map_err(|e| format!("latitude: {}", e))?,
        lon: lon.trim().parse().map_err(|e| format!("longitude: {}", e))?,
    })
}

pub async fn run(args: &InvalidateArgs, config: TileServerConfig) -> Result<(), CliError> {
    if !matches!(config.cache, CacheConfig::Remote { .. }) {
        return Err(CliError::InvalidArgument(
            "invalidation needs a remote cache; set [cache] type = redis".to_string(),
        ));
    }
    let cache = TileCacheService::from_config(&config.cache).await?;
    let table = args.table.as_deref().unwrap_or(&config.table);

    let removed = match (args.tile, args.location) {
        (Some(tile), _) => cache.invalidate_tile(table, tile).await?,
        (None, Some(location)) => {
            cache
                .invalidate_location(table, location.lat, location.lon)
                .await?
        }
        (None, None) => {
            return Err(CliError::InvalidArgument(
                "one of --tile or --location is required".to_string(),
            ))
        }
    };

    println!("Removed {} cached tile(s)", removed);
    Ok(())
}
