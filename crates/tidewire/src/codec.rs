//! Zlib content compression.

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::{self, Read};

/// Upper bound on a decompressed payload.
pub const MAX_DECOMPRESSED_SIZE: u64 = 64 * 1024 * 1024;

/// Compresses `content`, returning the compressed bytes only when they are
/// strictly smaller than the input.
pub(crate) fn compress_if_smaller(content: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(content, Compression::default());
    let mut compressed = Vec::new();
    // Reading from an in-memory slice cannot fail.
    encoder.read_to_end(&mut compressed).ok()?;
    (compressed.len() < content.len()).then_some(compressed)
}

/// Inflates a zlib payload.
pub(crate) fn decompress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(payload);
    let mut content = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut content)?;
    if content.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed payload exceeds {MAX_DECOMPRESSED_SIZE} bytes"),
        ));
    }
    Ok(content)
}
