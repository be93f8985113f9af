//! Deflate codec for image payloads.
//!
//! Payloads are zlib-deflated at best compression before they reach the
//! storage backend, and inflated again on retrieval. Whether a stored
//! payload is compressed is recorded on the owning product row, never
//! inferred from the bytes.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::ImageError;

/// Compress a payload with zlib at the highest compression level.
///
/// Empty input yields a valid (empty-stream) zlib payload.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a zlib payload back to the original bytes.
///
/// Malformed input fails with [`ImageError::Corrupt`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len());
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ImageError::Corrupt(e.to_string()))?;
    Ok(out)
}
