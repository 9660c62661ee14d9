use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{CodecError, Result};

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_BLOSCLZ: u8 = 0;
pub const CODEC_LZ4: u8 = 1;
pub const CODEC_LZ4HC: u8 = 2;
pub const CODEC_ZSTD: u8 = 3;

/// Highest accepted compression level for every codec.
pub const MAX_LEVEL: u8 = 9;

/// The compression codecs a channel may be configured with.
///
/// A codec is always paired with a level in `0..=9`. Level 0 stores blocks
/// verbatim regardless of the codec; higher levels trade speed for size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    Blosclz,
    #[default]
    Lz4,
    Lz4hc,
    Zstd,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::Blosclz, Codec::Lz4, Codec::Lz4hc, Codec::Zstd];

    /// Stable codec ID stored in every chunk frame header.
    pub fn id(self) -> u8 {
        match self {
            Codec::Blosclz => CODEC_BLOSCLZ,
            Codec::Lz4 => CODEC_LZ4,
            Codec::Lz4hc => CODEC_LZ4HC,
            Codec::Zstd => CODEC_ZSTD,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Blosclz => "blosclz",
            Codec::Lz4 => "lz4",
            Codec::Lz4hc => "lz4hc",
            Codec::Zstd => "zstd",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blosclz" => Ok(Codec::Blosclz),
            "lz4" => Ok(Codec::Lz4),
            "lz4hc" => Ok(Codec::Lz4hc),
            "zstd" => Ok(Codec::Zstd),
            _ => Err(CodecError::UnknownCodec(name.to_string())),
        }
    }

    /// The levels this codec accepts.
    pub fn level_range(self) -> RangeInclusive<u8> {
        match self {
            Codec::Blosclz | Codec::Lz4 | Codec::Lz4hc | Codec::Zstd => 0..=MAX_LEVEL,
        }
    }

    /// Check `level` against [`Codec::level_range`], returning it unchanged on success.
    pub fn validate_level(self, level: u8) -> Result<u8> {
        let range = self.level_range();
        if range.contains(&level) {
            Ok(level)
        } else {
            Err(CodecError::InvalidLevel {
                codec: self,
                level,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Codec::from_name(s)
    }
}

/// Compression primitive for a single independent block.
///
/// Implementations never see more than one block at a time and keep no state
/// between calls, so any block of a chunk frame can be decoded on its own.
pub trait BlockCodec: Send + Sync {
    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Compress one block at `level`, already validated against the codec.
    fn compress_block(&self, raw: &[u8], level: u8) -> Result<Vec<u8>>;

    /// Decompress one block whose original length is `raw_len`.
    ///
    /// Must fail with [`CodecError::Corrupt`] when the input is malformed.
    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for codec in Codec::ALL {
            assert_eq!(Codec::from_id(codec.id()), Some(codec));
            assert_eq!(Codec::from_name(codec.name()).unwrap(), codec);
        }
        assert_eq!(Codec::from_id(42), None);
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        assert_eq!("ZSTD".parse::<Codec>().unwrap(), Codec::Zstd);
        assert!(matches!(
            Codec::from_name("brotli"),
            Err(CodecError::UnknownCodec(name)) if name == "brotli"
        ));
    }

    #[test]
    fn level_out_of_range_is_rejected() {
        assert_eq!(Codec::Lz4.validate_level(9).unwrap(), 9);
        assert_eq!(Codec::Zstd.validate_level(0).unwrap(), 0);
        let err = Codec::Blosclz.validate_level(10).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLevel { level: 10, max: 9, .. }));
    }

    #[test]
    fn default_codec_is_lz4() {
        assert_eq!(Codec::default(), Codec::Lz4);
    }
}
