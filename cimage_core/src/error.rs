use std::fmt::Display;

use cimage_codecs::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported element type: {0}")]
    InvalidType(String),

    #[error("shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration mismatch: image {field} is {expected} but the channel has {actual}")]
    ConfigMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} index {index} out of range (total {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("unknown channel name '{0}'")]
    ChannelNotFound(String),

    #[error("corrupt chunk data: {0}")]
    CorruptData(String),

    #[error("expected exactly {expected} channel names but got {actual}")]
    ChannelNameCount { expected: usize, actual: usize },

    #[error("image source error: {0}")]
    Source(String),

    #[error("codec backend error: {0}")]
    Codec(#[source] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape(expected: impl Display, actual: impl Display) -> Self {
        Error::Shape {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn index(what: &'static str, index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { what, index, len }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Corrupt(message) => Error::CorruptData(message),
            CodecError::InvalidLevel { .. }
            | CodecError::UnknownCodec(_)
            | CodecError::InvalidBlockSize { .. }
            | CodecError::InvalidTypeSize(_)
            | CodecError::TooLarge(_) => Error::InvalidConfig(err.to_string()),
            CodecError::Backend { .. } => Error::Codec(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
