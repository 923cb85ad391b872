//! Cache key derivation.
//!
//! Keys have the form `{table}-{z}-{x}-{y}-{sha1}` where the digest covers
//! the request's filter clauses, sorted so that construction order does not
//! matter.

use std::fmt;

use sha1::{Digest, Sha1};

use crate::coord::TileCoord;
use crate::query::FilterClause;

/// Deterministic key of one tile-plus-filters combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a table, tile and filter set.
    ///
    /// # Example
    ///
    /// ```
    /// use clusterbuster::cache::CacheKey;
    /// use clusterbuster::coord::TileCoord;
    ///
    /// let tile = TileCoord::new(1, 0, 1).unwrap();
    /// let key = CacheKey::derive("public.stations", tile, &[]);
    /// assert_eq!(
    ///     key.as_str(),
    ///     "public.stations-1-0-1-da39a3ee5e6b4b0d3255bfef95601890afd80709"
    /// );
    /// ```
    pub fn derive(table: &str, tile: TileCoord, filters: &[FilterClause]) -> Self {
        Self(format!(
            "{}{}",
            Self::tile_prefix(table, tile),
            filters_digest(filters)
        ))
    }

    /// Prefix shared by every key of a tile, whatever its filters.
    pub fn tile_prefix(table: &str, tile: TileCoord) -> String {
        format!("{}-{}-{}-{}-", table, tile.z(), tile.x(), tile.y())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-1 of the lexicographically sorted clause texts joined with `-`.
pub fn filters_digest(filters: &[FilterClause]) -> String {
    let mut texts: Vec<String> = filters.iter().map(FilterClause::cache_text).collect();
    texts.sort();

    let mut hasher = Sha1::new();
    hasher.update(texts.join("-").as_bytes());
    format!("{:x}", hasher.finalize())
}
