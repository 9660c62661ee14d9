use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::builder::ChannelBuilder;
use crate::channel::Channel;
use crate::dtype::{as_bytes, from_bytes, Element, ElementType};
use crate::error::{Error, Result};
use crate::options::{ChannelOptions, DEFAULT_BLOCK_SIZE, DEFAULT_CHUNK_SIZE};
use crate::shared::SharedChannel;
use crate::source::{ImageSource, SourceOpener};
use crate::statistics::ImageStatistics;

/// Geometry every channel of an image has to agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub width: usize,
    pub height: usize,
    pub block_size: usize,
    /// Requested chunk size, before per-type row alignment.
    pub chunk_size: usize,
}

impl ImageLayout {
    fn new(width: usize, height: usize, options: &ChannelOptions) -> Self {
        Self {
            width,
            height,
            block_size: options.requested_block_size(),
            chunk_size: options.requested_chunk_size(),
        }
    }

    fn of(channel: &Channel) -> Self {
        Self::new(channel.width(), channel.height(), channel.options())
    }

    fn check(&self, other: &ImageLayout) -> Result<()> {
        let fields = [
            ("width", self.width, other.width),
            ("height", self.height, other.height),
            ("block size", self.block_size, other.block_size),
            ("chunk size", self.chunk_size, other.chunk_size),
        ];
        for (field, expected, actual) in fields {
            if expected != actual {
                return Err(Error::ConfigMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Which channels [`Image::read`] pulls from a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChannelSelection {
    #[default]
    All,
    Indices(Vec<usize>),
    Names(Vec<String>),
}

impl ChannelSelection {
    pub fn names<S: AsRef<str>>(names: &[S]) -> Self {
        ChannelSelection::Names(names.iter().map(|n| n.as_ref().to_string()).collect())
    }
}

/// Addresses a channel by name (first match) or by position.
#[derive(Debug, Clone, Copy)]
pub enum ChannelKey<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ChannelKey<'_> {
    fn from(index: usize) -> Self {
        ChannelKey::Index(index)
    }
}

impl<'a> From<&'a str> for ChannelKey<'a> {
    fn from(name: &'a str) -> Self {
        ChannelKey::Name(name)
    }
}

#[derive(Debug)]
struct ImageChannel {
    name: String,
    channel: SharedChannel,
}

/// An ordered set of named channels sharing width, height, block size and
/// chunk size, plus free-form string metadata.
///
/// Channel names need not be unique; name lookups resolve to the first
/// match. Channels are handed out as [`SharedChannel`] handles, so they stay
/// alive and editable independently of the image.
#[derive(Debug, Default)]
pub struct Image {
    channels: Vec<ImageChannel>,
    metadata: BTreeMap<String, String>,
    layout: Option<ImageLayout>,
}

impl Image {
    /// An empty image; its geometry is taken from the first channel added.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty image with its geometry fixed up front.
    pub fn with_size(width: usize, height: usize, options: &ChannelOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            layout: Some(ImageLayout::new(width, height, options)),
            ..Self::default()
        })
    }

    /// Compress `arrays` into one channel each.
    ///
    /// `names` is either empty (every channel gets an empty name) or holds one
    /// name per array.
    pub fn from_arrays<T: Element>(
        arrays: &[&[T]],
        width: usize,
        height: usize,
        names: &[&str],
        options: &ChannelOptions,
    ) -> Result<Self> {
        if !names.is_empty() && names.len() != arrays.len() {
            return Err(Error::ChannelNameCount {
                expected: arrays.len(),
                actual: names.len(),
            });
        }
        let mut image = Self::with_size(width, height, options)?;
        for (index, &data) in arrays.iter().enumerate() {
            let name = names.get(index).copied();
            image.add_channel(data, width, height, name, options)?;
        }
        Ok(image)
    }

    /// Read `selection` from subimage `subimage` of the file at `path`,
    /// compressing each channel one chunk of rows at a time.
    ///
    /// Channels appear in request order. Unknown names fail with
    /// [`Error::ChannelNotFound`], bad indices with [`Error::IndexOutOfRange`].
    pub fn read<O: SourceOpener>(
        opener: &O,
        path: impl AsRef<Path>,
        subimage: usize,
        dtype: ElementType,
        selection: &ChannelSelection,
        options: &ChannelOptions,
    ) -> Result<Self> {
        Self::ingest(opener, path.as_ref(), subimage, dtype, selection, options, |_, _| {})
    }

    /// Like [`Image::read`], storing the channels as `T` and letting
    /// `postprocess` edit every run of rows before it is compressed.
    ///
    /// `postprocess` receives the channel's position in the new image and a
    /// whole number of rows, at most one chunk's worth, e.g. to apply a color
    /// space conversion during ingestion.
    pub fn read_with<T, O, F>(
        opener: &O,
        path: impl AsRef<Path>,
        subimage: usize,
        selection: &ChannelSelection,
        options: &ChannelOptions,
        mut postprocess: F,
    ) -> Result<Self>
    where
        T: Element,
        O: SourceOpener,
        F: FnMut(usize, &mut [T]),
    {
        Self::ingest(opener, path.as_ref(), subimage, T::DTYPE, selection, options, |channel, rows| {
            let mut values = from_bytes::<T>(rows);
            postprocess(channel, &mut values);
            rows.copy_from_slice(as_bytes(&values));
        })
    }

    /// Metadata of subimage `subimage` of the file at `path`, without reading
    /// any pixels.
    pub fn read_metadata<O: SourceOpener>(
        opener: &O,
        path: impl AsRef<Path>,
        subimage: usize,
    ) -> Result<BTreeMap<String, String>> {
        let source = opener.open(path.as_ref(), subimage)?;
        Ok(source.metadata())
    }

    fn ingest<O, F>(
        opener: &O,
        path: &Path,
        subimage: usize,
        dtype: ElementType,
        selection: &ChannelSelection,
        options: &ChannelOptions,
        mut postprocess: F,
    ) -> Result<Self>
    where
        O: SourceOpener,
        F: FnMut(usize, &mut [u8]),
    {
        let mut source = opener.open(path, subimage)?;
        let indices = resolve_selection(&source, selection)?;
        let (width, height) = (source.width(), source.height());

        let mut image = Self::with_size(width, height, options)?;
        for (position, index) in indices.into_iter().enumerate() {
            let mut builder = ChannelBuilder::new(dtype, width, height, *options)?;
            let rows_per_chunk = builder.rows_per_chunk();
            let mut start = 0;
            while start < height {
                let end = (start + rows_per_chunk).min(height);
                let mut rows = source.read_rows(index, start..end, dtype)?;
                postprocess(position, rows.as_mut_slice());
                builder.push_row_bytes(&rows)?;
                start = end;
            }
            let name = source.channel_name(index).unwrap_or_default().to_string();
            image.push(name, SharedChannel::new(builder.finish()?));
        }
        image.metadata = source.metadata();

        debug!(
            path = %path.display(),
            subimage,
            dtype = %dtype,
            channels = image.len(),
            width,
            height,
            "read image"
        );
        Ok(image)
    }

    /// Compress `data` and append it as a new channel.
    ///
    /// Block and chunk sizes left unset in `options` are taken from the image.
    /// Geometry must match the image's; it is checked before any compression
    /// work. Returns a handle to the new channel.
    pub fn add_channel<T: Element>(
        &mut self,
        data: &[T],
        width: usize,
        height: usize,
        name: Option<&str>,
        options: &ChannelOptions,
    ) -> Result<SharedChannel> {
        let options = self.inherit_sizes(options);
        self.check_layout(&ImageLayout::new(width, height, &options))?;
        let channel = Channel::from_array(data, width, height, options)?;
        self.add_existing_channel(channel, name)
    }

    fn inherit_sizes(&self, options: &ChannelOptions) -> ChannelOptions {
        let mut options = *options;
        if let Some(layout) = &self.layout {
            options.block_size.get_or_insert(layout.block_size);
            // An unset chunk size already resolves to the default one.
            if options.chunk_size.is_none() && layout.chunk_size != DEFAULT_CHUNK_SIZE {
                options.chunk_size = Some(layout.chunk_size);
            }
        }
        options
    }

    /// Append an already built channel (or a handle to one, which is then
    /// shared rather than copied).
    pub fn add_existing_channel(
        &mut self,
        channel: impl Into<SharedChannel>,
        name: Option<&str>,
    ) -> Result<SharedChannel> {
        let channel = channel.into();
        let layout = ImageLayout::of(&channel.read());
        self.check_layout(&layout)?;
        self.layout.get_or_insert(layout);
        self.push(name.unwrap_or_default().to_string(), channel.clone());
        debug!(
            name = name.unwrap_or_default(),
            channels = self.len(),
            "added channel"
        );
        Ok(channel)
    }

    fn push(&mut self, name: String, channel: SharedChannel) {
        self.channels.push(ImageChannel { name, channel });
    }

    fn check_layout(&self, candidate: &ImageLayout) -> Result<()> {
        match &self.layout {
            Some(layout) => layout.check(candidate),
            None => Ok(()),
        }
    }

    /// Remove a channel by name or index and return its handle.
    pub fn remove_channel<'a>(&mut self, key: impl Into<ChannelKey<'a>>) -> Result<SharedChannel> {
        let index = self.resolve(key.into())?;
        let removed = self.channels.remove(index);
        debug!(name = %removed.name, index, "removed channel");
        Ok(removed.channel)
    }

    fn resolve(&self, key: ChannelKey<'_>) -> Result<usize> {
        match key {
            ChannelKey::Index(index) if index < self.channels.len() => Ok(index),
            ChannelKey::Index(index) => Err(Error::index("channel", index, self.channels.len())),
            ChannelKey::Name(name) => self
                .channel_index(name)
                .ok_or_else(|| Error::ChannelNotFound(name.to_string())),
        }
    }

    /// Position of the first channel called `name`.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|entry| entry.name == name)
    }

    pub fn channel(&self, name: &str) -> Result<SharedChannel> {
        let index = self.resolve(ChannelKey::Name(name))?;
        Ok(self.channels[index].channel.clone())
    }

    pub fn channel_at(&self, index: usize) -> Result<SharedChannel> {
        let index = self.resolve(ChannelKey::Index(index))?;
        Ok(self.channels[index].channel.clone())
    }

    /// Handles for `names`, in the order given.
    pub fn channels(&self, names: &[&str]) -> Result<Vec<SharedChannel>> {
        names.iter().map(|name| self.channel(name)).collect()
    }

    pub fn all_channels(&self) -> Vec<SharedChannel> {
        self.channels.iter().map(|entry| entry.channel.clone()).collect()
    }

    /// `(name, handle)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedChannel)> {
        self.channels
            .iter()
            .map(|entry| (entry.name.as_str(), &entry.channel))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn num_channels(&self) -> usize {
        self.len()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.name.clone()).collect()
    }

    /// Rename every channel at once.
    pub fn set_channel_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        if names.len() != self.channels.len() {
            return Err(Error::ChannelNameCount {
                expected: self.channels.len(),
                actual: names.len(),
            });
        }
        for (entry, name) in self.channels.iter_mut().zip(names) {
            entry.name = name.as_ref().to_string();
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.layout.map_or(0, |layout| layout.width)
    }

    pub fn height(&self) -> usize {
        self.layout.map_or(0, |layout| layout.height)
    }

    /// `(num_channels, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len(), self.height(), self.width())
    }

    /// Requested chunk size shared by all channels.
    pub fn chunk_size(&self) -> usize {
        self.layout.map_or(DEFAULT_CHUNK_SIZE, |layout| layout.chunk_size)
    }

    pub fn block_size(&self) -> usize {
        self.layout.map_or(DEFAULT_BLOCK_SIZE, |layout| layout.block_size)
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Replace the metadata map wholesale.
    pub fn set_metadata(&mut self, metadata: BTreeMap<String, String>) {
        self.metadata = metadata;
    }

    /// Every channel decompressed, planar, in channel order.
    pub fn get_decompressed<T: Element>(&self) -> Result<Vec<Vec<T>>> {
        self.channels
            .iter()
            .map(|entry| entry.channel.get_decompressed())
            .collect()
    }

    /// Bytes held by all chunks of all channels.
    pub fn compressed_size(&self) -> usize {
        self.channels
            .iter()
            .map(|entry| entry.channel.read().compressed_size())
            .sum()
    }

    /// Bytes all channels occupy decompressed.
    pub fn uncompressed_size(&self) -> usize {
        self.channels
            .iter()
            .map(|entry| {
                let channel = entry.channel.read();
                channel.uncompressed_size() * channel.dtype().size()
            })
            .sum()
    }

    pub fn compression_ratio(&self) -> f64 {
        let compressed = self.compressed_size();
        if compressed == 0 {
            return 1.0;
        }
        self.uncompressed_size() as f64 / compressed as f64
    }

    pub fn statistics(&self) -> ImageStatistics {
        let (num_chunks, num_lazy_chunks) = self.channels.iter().fold((0, 0), |(all, lazy), entry| {
            let channel = entry.channel.read();
            (all + channel.num_chunks(), lazy + channel.num_lazy_chunks())
        });
        ImageStatistics {
            width: self.width(),
            height: self.height(),
            channel_names: self.channel_names(),
            compressed_size: self.compressed_size(),
            uncompressed_size: self.uncompressed_size(),
            num_chunks,
            num_lazy_chunks,
            metadata: self.metadata.clone(),
        }
    }
}

fn resolve_selection<S: ImageSource>(source: &S, selection: &ChannelSelection) -> Result<Vec<usize>> {
    let count = source.channel_count();
    match selection {
        ChannelSelection::All => Ok((0..count).collect()),
        ChannelSelection::Indices(indices) => indices
            .iter()
            .map(|&index| {
                if index < count {
                    Ok(index)
                } else {
                    Err(Error::index("channel", index, count))
                }
            })
            .collect(),
        ChannelSelection::Names(names) => names
            .iter()
            .map(|name| {
                (0..count)
                    .find(|&index| source.channel_name(index) == Some(name.as_str()))
                    .ok_or_else(|| Error::ChannelNotFound(name.clone()))
            })
            .collect(),
    }
}
