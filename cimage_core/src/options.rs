//! Compression configuration shared by channels and images.

use cimage_codecs::{validate_block_size, Codec};

use crate::dtype::ElementType;
use crate::error::{Error, Result};

/// Default codec-internal block size: 32 KB, small enough to stay in L1/L2
/// cache while a block is being compressed.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Default chunk size: 4 MB, enough to hold a 2048x2048 8-bit channel in a
/// single chunk. Aligned down to whole rows for each channel.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default compression level.
pub const DEFAULT_LEVEL: u8 = 9;

/// How a channel's chunks are compressed and how large they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Codec applied to every chunk of the channel.
    pub codec: Codec,
    /// Compression level, `0..=9`. Level 0 stores blocks uncompressed.
    pub level: u8,
    /// Raw bytes per independently compressed block inside a chunk. `None`
    /// picks [`DEFAULT_BLOCK_SIZE`], or the image's block size when the
    /// channel is added to an image.
    pub block_size: Option<usize>,
    /// Bytes per chunk. `None` picks [`DEFAULT_CHUNK_SIZE`] aligned down to
    /// whole rows; an explicit value must already be a multiple of the row size.
    pub chunk_size: Option<usize>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            level: DEFAULT_LEVEL,
            block_size: None,
            chunk_size: None,
        }
    }
}

impl ChannelOptions {
    pub fn builder() -> ChannelOptionsBuilder {
        ChannelOptionsBuilder::default()
    }

    /// Check codec level, block size and chunk size independently of any
    /// channel geometry.
    pub fn validate(&self) -> Result<()> {
        self.codec.validate_level(self.level)?;
        validate_block_size(self.requested_block_size())?;
        if self.chunk_size == Some(0) {
            return Err(Error::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn requested_block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// The chunk size as configured, before row alignment. This is the value
    /// an image compares across its channels.
    pub fn requested_chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Effective bytes per full chunk for a channel of `dtype` and `width`.
    pub fn resolve_chunk_size(&self, dtype: ElementType, width: usize) -> Result<usize> {
        if width == 0 {
            return Err(Error::InvalidConfig("channel width must be greater than zero".to_string()));
        }
        let row_bytes = width
            .checked_mul(dtype.size())
            .ok_or_else(|| too_large(dtype, width, 1))?;
        let chunk_size = match self.chunk_size {
            Some(size) => {
                if size == 0 || size % row_bytes != 0 {
                    return Err(Error::InvalidConfig(format!(
                        "chunk size {} is not a positive multiple of the row size {} ({} x {} bytes)",
                        size,
                        row_bytes,
                        width,
                        dtype.size()
                    )));
                }
                size
            }
            None => (DEFAULT_CHUNK_SIZE - DEFAULT_CHUNK_SIZE % row_bytes).max(row_bytes),
        };
        if u32::try_from(chunk_size).is_err() {
            return Err(Error::InvalidConfig(format!(
                "chunk size {} exceeds the maximum of {} bytes",
                chunk_size,
                u32::MAX
            )));
        }
        Ok(chunk_size)
    }
}

/// Number of elements in a `width * height` channel.
pub(crate) fn checked_elements(dtype: ElementType, width: usize, height: usize) -> Result<usize> {
    checked_bytes(dtype, width, height).map(|bytes| bytes / dtype.size())
}

/// Raw size in bytes of a `width * height` channel of `dtype`.
pub(crate) fn checked_bytes(dtype: ElementType, width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|elements| elements.checked_mul(dtype.size()))
        .ok_or_else(|| too_large(dtype, width, height))
}

fn too_large(dtype: ElementType, width: usize, height: usize) -> Error {
    Error::InvalidConfig(format!(
        "{} x {} {} elements do not fit in memory",
        height, width, dtype
    ))
}

/// Builder for [`ChannelOptions`].
#[derive(Default)]
pub struct ChannelOptionsBuilder {
    codec: Option<Codec>,
    level: Option<u8>,
    block_size: Option<usize>,
    chunk_size: Option<usize>,
}

impl ChannelOptionsBuilder {
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn build(self) -> ChannelOptions {
        let default = ChannelOptions::default();
        ChannelOptions {
            codec: self.codec.unwrap_or(default.codec),
            level: self.level.unwrap_or(default.level),
            block_size: self.block_size.or(default.block_size),
            chunk_size: self.chunk_size.or(default.chunk_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let options = ChannelOptions::builder().codec(Codec::Zstd).level(3).build();
        assert_eq!(options.codec, Codec::Zstd);
        assert_eq!(options.level, 3);
        assert_eq!(options.block_size, None);
        assert_eq!(options.requested_block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(options.chunk_size, None);
        assert_eq!(options.requested_chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn validation_catches_bad_levels_and_sizes() {
        let bad_level = ChannelOptions::builder().level(10).build();
        assert!(matches!(bad_level.validate(), Err(Error::InvalidConfig(_))));

        let bad_block = ChannelOptions::builder().block_size(0).build();
        assert!(matches!(bad_block.validate(), Err(Error::InvalidConfig(_))));

        let bad_chunk = ChannelOptions::builder().chunk_size(0).build();
        assert!(matches!(bad_chunk.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn default_chunk_size_aligns_to_rows() {
        let options = ChannelOptions::default();
        let size = options.resolve_chunk_size(ElementType::U8, 123).unwrap();
        assert_eq!(size % 123, 0);
        assert!(size <= DEFAULT_CHUNK_SIZE);

        // Rows wider than the default still get one row per chunk.
        let wide = options.resolve_chunk_size(ElementType::F32, 2 * 1024 * 1024).unwrap();
        assert_eq!(wide, 8 * 1024 * 1024);
    }

    #[test]
    fn explicit_chunk_size_must_hold_whole_rows() {
        let options = ChannelOptions::builder().chunk_size(128).build();
        assert_eq!(options.resolve_chunk_size(ElementType::U16, 64).unwrap(), 128);

        let err = options.resolve_chunk_size(ElementType::U16, 48).unwrap_err();
        assert!(err.to_string().contains("row size 96"), "got: {err}");
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        let options = ChannelOptions::default();
        assert!(matches!(
            options.resolve_chunk_size(ElementType::U32, usize::MAX / 2),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            checked_bytes(ElementType::U16, usize::MAX / 4, 3),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(checked_elements(ElementType::F32, 7, 3).unwrap(), 21);
    }
}
