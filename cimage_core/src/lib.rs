//! Chunked, compressed storage for 2D raster channels and multi-channel images.
//!
//! A [`Channel`] splits a single-component image into runs of whole rows and
//! keeps each run as an independently compressed [`Chunk`], or as a lazy
//! constant fill that costs nothing until it is written. An [`Image`] groups
//! channels of equal geometry under names and hands them out as
//! [`SharedChannel`] handles.
//!
//! ```no_run
//! use cimage_core::{Channel, ChannelOptions, ElementType};
//!
//! let mut channel = Channel::zeros(ElementType::U16, 4096, 4096, ChannelOptions::default())?;
//! channel.update_chunk::<u16, _>(0, |rows| {
//!     rows.fill(1000);
//!     Ok(())
//! })?;
//! assert_eq!(channel.get_chunk::<u16>(0)?[0], 1000);
//! # Ok::<(), cimage_core::Error>(())
//! ```

pub mod builder;
pub mod channel;
pub mod chunk;
pub mod dtype;
pub mod error;
pub mod image;
pub mod options;
pub mod raw_planar;
pub mod shared;
pub mod source;
pub mod statistics;

pub use builder::ChannelBuilder;
pub use channel::Channel;
pub use chunk::Chunk;
pub use dtype::{Element, ElementType, Scalar};
pub use error::{Error, Result};
pub use image::{ChannelKey, ChannelSelection, Image, ImageLayout};
pub use options::{ChannelOptions, ChannelOptionsBuilder, DEFAULT_BLOCK_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_LEVEL};
pub use raw_planar::{RawPlanarLayout, RawPlanarOpener, RawPlanarSource};
pub use shared::SharedChannel;
pub use source::{ImageSource, MemoryImage, MemoryOpener, MemorySource, SourceOpener};
pub use statistics::ImageStatistics;

pub use cimage_codecs::Codec;
pub use half::f16;
