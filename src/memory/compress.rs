// Gzip compression helpers for the in-memory tier (spec §4.B).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CacheError, Result};

/// Gzips `bytes`, returning `None` if the compressed form is not strictly
/// smaller (spec: "keeps the compressed form only if strictly smaller").
pub fn try_compress(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return None;
    }
    let compressed = match encoder.finish() {
        Ok(c) => c,
        Err(_) => return None,
    };
    if compressed.len() < bytes.len() {
        Some(compressed)
    } else {
        None
    }
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Corrupted(format!("decompression failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let original = "abcdefghijklmnop".repeat(1000);
        let compressed = try_compress(original.as_bytes()).expect("should compress");
        assert!(compressed.len() < original.len());
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, original.as_bytes());
    }

    #[test]
    fn incompressible_data_returns_none() {
        // A tiny input has enough gzip framing overhead that it never
        // shrinks below its own size.
        let tiny = b"ab";
        assert!(try_compress(tiny).is_none());
    }
}
