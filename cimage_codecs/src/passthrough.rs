use crate::codec::BlockCodec;
use crate::error::{CodecError, Result};

/// No-op backend: stores blocks verbatim.
///
/// Selected for level 0 of every codec. Also useful for data that is already
/// compressed and would only grow under another pass.
pub struct PassThroughCodec;

impl BlockCodec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        if compressed.len() != raw_len {
            return Err(CodecError::Corrupt(format!(
                "stored block holds {} bytes but {} were expected",
                compressed.len(),
                raw_len
            )));
        }
        Ok(compressed.to_vec())
    }
}
