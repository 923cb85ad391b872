//! Pipeline stages shared by the tile server.

mod cache;

pub use cache::{check_cache, store_cache};
