//! Print the compiled statement for a tile.

use clusterbuster::coord::TileCoord;
use clusterbuster::query::{BoundingBox, ClusterSpec, QueryCompiler, QueryTarget};
use clusterbuster::TileServerConfig;

use super::TileArgs;
use crate::error::CliError;

/// Compile the plan for `args` and write it, with its bound values, to stdout.
pub fn run(args: &TileArgs, config: TileServerConfig) -> Result<(), CliError> {
    let config = args.apply(config);
    let tile = TileCoord::parse(&args.z, &args.x, &args.y)?;

    let bounding_box = if config.widen_bounding_box {
        BoundingBox::Widened
    } else {
        BoundingBox::Exact
    };
    let target = QueryTarget::new(config.table.clone())
        .with_geometry_column(config.geometry_column.clone())
        .with_source_layer(config.source_layer.clone())
        .with_extent(config.extent)
        .with_buffer_size(config.buffer_size)
        .with_attributes(config.attributes.clone());
    let cluster = ClusterSpec::new(config.max_zoom_level, config.radius);

    let plan = QueryCompiler::new()
        .with_clustered_bounding_box(bounding_box)
        .compile(tile, &cluster, &target, &args.filter_clauses())?;

    println!(
        "-- tile {} ({:?}, {} level(s))",
        tile,
        plan.branch(),
        plan.level_count()
    );
    print!("{}", plan.render());
    Ok(())
}
