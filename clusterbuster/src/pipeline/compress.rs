//! Gzip compression of encoded tiles.
//!
//! Tiles are stored and served gzip-compressed. Compression is CPU-bound, so
//! the async entry point moves it onto tokio's blocking pool.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Gzip-compress a payload at the default level.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a gzip payload.
pub fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compress a tile on the blocking pool.
pub async fn compress_tile(data: Vec<u8>) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || gzip(&data))
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
}
