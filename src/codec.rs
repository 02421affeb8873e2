//! Reversible compress + encode of binary payloads.
//!
//! PDFs are embedded in the JSON output as zlib-compressed, standard
//! base64-encoded text so a consumer can rebuild the original bytes without
//! fetching them again.

use crate::error::DecodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Compress `data` with zlib and encode the result as base64.
///
/// Total for every input, including the empty slice.
pub fn encode(data: &[u8]) -> String {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
    // Writing into a Vec cannot fail.
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(bytes) => bytes,
        Err(_) => unreachable!("zlib encoder over Vec<u8> reported an I/O error"),
    };
    STANDARD.encode(compressed)
}

/// Inverse of [`encode`].
///
/// # Errors
///
/// Returns [`DecodeError`] if `data` is not base64 or the decoded bytes are
/// not a complete zlib stream.
pub fn decode(data: &str) -> Result<Vec<u8>, DecodeError> {
    let compressed = STANDARD.decode(data.trim())?;
    let mut out = Vec::with_capacity(compressed.len() * 2);
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut out)?;
    Ok(out)
}
