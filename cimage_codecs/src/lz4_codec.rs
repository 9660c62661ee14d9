use lz4_flex::block::{compress, decompress};

use crate::codec::BlockCodec;
use crate::error::{CodecError, Result};

/// LZ4 block backend, shared by the `lz4` and `lz4hc` codecs.
///
/// Both emit the plain LZ4 block format, so any LZ4 decoder reads either.
/// `lz4_flex` has a single match-search strategy and no level knob, so the
/// level only matters for the level-0 passthrough decision made by the registry.
///
/// Best for: hot data, low-latency chunk access.
pub struct Lz4Codec {
    name: &'static str,
}

impl Lz4Codec {
    pub const FAST: Lz4Codec = Lz4Codec { name: "lz4" };
    pub const HIGH_COMPRESSION: Lz4Codec = Lz4Codec { name: "lz4hc" };
}

impl BlockCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compress_block(&self, raw: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(compress(raw))
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        decompress(compressed, raw_len)
            .map_err(|e| CodecError::Corrupt(format!("{} decompress error: {}", self.name, e)))
    }
}
