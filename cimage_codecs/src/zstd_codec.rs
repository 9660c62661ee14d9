use crate::codec::BlockCodec;
use crate::error::{CodecError, Result};

/// Zstandard block backend.
///
/// Levels `1..=9` are spread over zstd's range as `2 * level - 1`, so level 9
/// compresses at zstd level 17.
///
/// Best for: cold data where size matters more than decode latency.
pub struct ZstdCodec;

impl ZstdCodec {
    pub fn zstd_level(level: u8) -> i32 {
        (2 * i32::from(level) - 1).max(1)
    }
}

impl BlockCodec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8], level: u8) -> Result<Vec<u8>> {
        zstd::bulk::compress(raw, Self::zstd_level(level)).map_err(|e| CodecError::Backend {
            codec: "zstd",
            message: e.to_string(),
        })
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        // The block table already carries the raw length, so the output can be
        // sized exactly instead of trusting the frame's content-size field.
        zstd::bulk::decompress(compressed, raw_len)
            .map_err(|e| CodecError::Corrupt(format!("zstd decompress error: {}", e)))
    }
}
