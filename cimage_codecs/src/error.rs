use thiserror::Error;

use crate::codec::Codec;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid compression level {level} for codec {codec}: expected a value in {min}..={max}")]
    InvalidLevel { codec: Codec, level: u8, min: u8, max: u8 },

    #[error("unknown codec '{0}'; valid codecs are blosclz, lz4, lz4hc, zstd")]
    UnknownCodec(String),

    #[error("invalid block size {size}: expected a value in 1..={max}")]
    InvalidBlockSize { size: usize, max: usize },

    #[error("invalid element size {0}: expected a value in 1..=255")]
    InvalidTypeSize(usize),

    #[error("chunk of {0} bytes exceeds the maximum frame size of {max} bytes", max = u32::MAX)]
    TooLarge(usize),

    #[error("{codec} backend failed to compress: {message}")]
    Backend { codec: &'static str, message: String },

    #[error("corrupt chunk data: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
