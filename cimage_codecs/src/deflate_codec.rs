use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::codec::BlockCodec;
use crate::error::{CodecError, Result};

/// Backend for the `blosclz` codec: a raw DEFLATE stream via `flate2`.
///
/// BloscLZ itself has no Rust implementation; DEFLATE is the closest LZ77
/// family member available and maps its `1..=9` levels one-to-one.
pub struct DeflateCodec;

impl BlockCodec for DeflateCodec {
    fn name(&self) -> &'static str {
        "blosclz"
    }

    fn compress_block(&self, raw: &[u8], level: u8) -> Result<Vec<u8>> {
        let backend_err = |e: std::io::Error| CodecError::Backend {
            codec: "blosclz",
            message: e.to_string(),
        };
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(u32::from(level)),
        );
        encoder.write_all(raw).map_err(backend_err)?;
        encoder.finish().map_err(backend_err)
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(raw_len);
        // Read one byte past the expected length so oversized streams are caught.
        DeflateDecoder::new(compressed)
            .take(raw_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| CodecError::Corrupt(format!("deflate decompress error: {}", e)))?;
        Ok(raw)
    }
}
