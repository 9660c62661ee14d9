use std::ops::Range;

use cimage_codecs::Codec;
use tracing::{debug, trace};

use crate::builder::ChannelBuilder;
use crate::chunk::Chunk;
use crate::dtype::{as_bytes, from_bytes, Element, ElementType, Scalar};
use crate::error::{Error, Result};
use crate::options::{checked_bytes, checked_elements, ChannelOptions};

/// A single-component 2D array stored as a sequence of compressed chunks.
///
/// Every chunk but the last covers [`rows_per_chunk`](Self::rows_per_chunk)
/// whole rows; the last covers whatever is left. All chunks share the
/// channel's element type, codec and level.
///
/// Reads hand out owned buffers and writes take a buffer and recompress it,
/// so no caller ever holds a reference into decompressed chunk memory.
#[derive(Debug, Clone)]
pub struct Channel {
    dtype: ElementType,
    width: usize,
    height: usize,
    /// Effective bytes per full chunk, a multiple of the row size.
    chunk_size: usize,
    options: ChannelOptions,
    chunks: Vec<Chunk>,
}

impl Channel {
    pub(crate) fn from_parts(
        dtype: ElementType,
        width: usize,
        height: usize,
        chunk_size: usize,
        options: ChannelOptions,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            dtype,
            width,
            height,
            chunk_size,
            options,
            chunks,
        }
    }

    /// Compress a row-major `width * height` buffer into a channel.
    pub fn from_array<T: Element>(
        data: &[T],
        width: usize,
        height: usize,
        options: ChannelOptions,
    ) -> Result<Self> {
        let expected = checked_elements(T::DTYPE, width, height)?;
        if data.len() != expected {
            return Err(Error::shape(
                format!("{} elements ({} x {})", expected, height, width),
                format!("{} elements", data.len()),
            ));
        }
        let mut builder = ChannelBuilder::new(T::DTYPE, width, height, options)?;
        builder.push_rows(data)?;
        builder.finish()
    }

    /// Like [`Channel::from_array`] for a native-endian byte buffer of `dtype`.
    pub fn from_bytes(
        dtype: ElementType,
        bytes: &[u8],
        width: usize,
        height: usize,
        options: ChannelOptions,
    ) -> Result<Self> {
        let expected = checked_bytes(dtype, width, height)?;
        if bytes.len() != expected {
            return Err(Error::shape(
                format!("{} bytes ({} x {} {})", expected, height, width, dtype),
                format!("{} bytes", bytes.len()),
            ));
        }
        let mut builder = ChannelBuilder::new(dtype, width, height, options)?;
        builder.push_row_bytes(bytes)?;
        builder.finish()
    }

    /// A channel of all zeros. No pixel data is allocated or compressed.
    pub fn zeros(
        dtype: ElementType,
        width: usize,
        height: usize,
        options: ChannelOptions,
    ) -> Result<Self> {
        Self::full(dtype, Scalar::zero(dtype), width, height, options)
    }

    /// A channel where every element is `fill`, converted to `dtype`.
    pub fn full(
        dtype: ElementType,
        fill: impl Into<Scalar>,
        width: usize,
        height: usize,
        options: ChannelOptions,
    ) -> Result<Self> {
        options.validate()?;
        if height == 0 {
            return Err(Error::InvalidConfig("channel height must be greater than zero".to_string()));
        }
        let chunk_size = options.resolve_chunk_size(dtype, width)?;
        checked_bytes(dtype, width, height)?;
        let fill = Scalar::cast(fill.into(), dtype);
        let channel = Self::lazy(dtype, fill, width, height, chunk_size, options);
        debug!(
            dtype = %dtype,
            width,
            height,
            chunks = channel.num_chunks(),
            fill = %fill,
            "created constant channel"
        );
        Ok(channel)
    }

    /// A zero-filled channel with the geometry and compression settings of `other`.
    pub fn zeros_like(other: &Channel) -> Self {
        Self::full_like(other, Scalar::zero(other.dtype))
    }

    /// Like [`Channel::zeros_like`] but filled with `fill`, converted to
    /// `other`'s element type.
    pub fn full_like(other: &Channel, fill: impl Into<Scalar>) -> Self {
        let fill = Scalar::cast(fill.into(), other.dtype);
        Self::lazy(
            other.dtype,
            fill,
            other.width,
            other.height,
            other.chunk_size,
            other.options,
        )
    }

    fn lazy(
        dtype: ElementType,
        fill: Scalar,
        width: usize,
        height: usize,
        chunk_size: usize,
        options: ChannelOptions,
    ) -> Self {
        let rows_per_chunk = chunk_size / (width * dtype.size());
        let chunks = (0..height.div_ceil(rows_per_chunk))
            .map(|index| {
                let rows = rows_per_chunk.min(height - index * rows_per_chunk);
                Chunk::constant(fill, rows, width)
            })
            .collect();
        Self::from_parts(dtype, width, height, chunk_size, options, chunks)
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes covered by one full chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Elements covered by one full chunk.
    pub fn chunk_elems(&self) -> usize {
        self.chunk_size / self.dtype.size()
    }

    /// Number of elements, `width * height`.
    pub fn uncompressed_size(&self) -> usize {
        self.width * self.height
    }

    pub fn compression(&self) -> Codec {
        self.options.codec
    }

    pub fn compression_level(&self) -> u8 {
        self.options.level
    }

    pub fn block_size(&self) -> usize {
        self.options.requested_block_size()
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(height, width)`, row-major.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn rows_per_chunk(&self) -> usize {
        self.chunk_size / self.row_bytes()
    }

    fn row_bytes(&self) -> usize {
        self.width * self.dtype.size()
    }

    /// The chunk at `index`, for inspection.
    pub fn chunk(&self, index: usize) -> Result<&Chunk> {
        self.chunks
            .get(index)
            .ok_or_else(|| Error::index("chunk", index, self.chunks.len()))
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Rows covered by chunk `index`; only the last chunk may be short.
    pub fn chunk_rows(&self, index: usize) -> Result<usize> {
        Ok(self.chunk(index)?.rows())
    }

    /// Row range of the channel covered by chunk `index`.
    pub fn chunk_row_range(&self, index: usize) -> Result<Range<usize>> {
        let rows = self.chunk_rows(index)?;
        let start = index * self.rows_per_chunk();
        Ok(start..start + rows)
    }

    pub fn is_lazy_chunk(&self, index: usize) -> Result<bool> {
        Ok(self.chunk(index)?.is_lazy())
    }

    pub fn num_lazy_chunks(&self) -> usize {
        self.chunks.iter().filter(|chunk| chunk.is_lazy()).count()
    }

    /// Bytes held by all chunks.
    pub fn compressed_size(&self) -> usize {
        self.chunks.iter().map(Chunk::compressed_size).sum()
    }

    /// Uncompressed bytes over compressed bytes.
    pub fn compression_ratio(&self) -> f64 {
        let compressed = self.compressed_size();
        if compressed == 0 {
            return 1.0;
        }
        (self.uncompressed_size() * self.dtype.size()) as f64 / compressed as f64
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(Error::InvalidType(format!(
                "channel stores {} but {} was requested",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(())
    }

    /// Decompress chunk `index` into a new buffer of `rows * width` elements.
    pub fn get_chunk<T: Element>(&self, index: usize) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        Ok(from_bytes(&self.get_chunk_bytes(index)?))
    }

    /// Decompress chunk `index` as native-endian bytes.
    pub fn get_chunk_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let chunk = self.chunk(index)?;
        trace!(index, lazy = chunk.is_lazy(), "decompressing chunk");
        chunk.materialize()
    }

    /// Decompress chunk `index` into `out`, which must hold exactly the
    /// chunk's element count.
    pub fn get_chunk_into<T: Element>(&self, index: usize, out: &mut [T]) -> Result<()> {
        self.check_type::<T>()?;
        let chunk = self.chunk(index)?;
        if out.len() != chunk.num_elements() {
            return Err(Error::shape(
                format!("{} elements ({} rows x {})", chunk.num_elements(), chunk.rows(), self.width),
                format!("{} elements", out.len()),
            ));
        }
        trace!(index, lazy = chunk.is_lazy(), "decompressing chunk");
        chunk.materialize_into(bytemuck::cast_slice_mut(out))
    }

    /// Replace chunk `index` with `data` compressed as a dense chunk.
    ///
    /// `data` is taken as flat, i.e. shape `[rows * width]`. The replacement
    /// is always dense, even when the chunk was lazy and `data` is constant.
    /// On error the channel is left unchanged.
    pub fn set_chunk<T: Element>(&mut self, index: usize, data: &[T]) -> Result<()> {
        self.set_chunk_shaped(index, data, &[data.len()])
    }

    /// Like [`Channel::set_chunk`] with an explicit buffer shape, which must be
    /// either `[rows * width]` or `[rows, width]`.
    pub fn set_chunk_shaped<T: Element>(
        &mut self,
        index: usize,
        data: &[T],
        shape: &[usize],
    ) -> Result<()> {
        self.check_type::<T>()?;
        let rows = self.chunk_rows(index)?;
        let elements = rows * self.width;
        let canonical = match shape {
            [n] => *n == elements,
            [r, w] => *r == rows && *w == self.width,
            _ => false,
        };
        if !canonical || data.len() != elements {
            return Err(Error::shape(
                format!("[{}] or [{}, {}]", elements, rows, self.width),
                format!("{:?} holding {} elements", shape, data.len()),
            ));
        }
        self.replace_chunk(index, as_bytes(data))
    }

    /// Like [`Channel::set_chunk`] for native-endian bytes of the channel's type.
    pub fn set_chunk_bytes(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let rows = self.chunk_rows(index)?;
        let expected = rows * self.row_bytes();
        if bytes.len() != expected {
            return Err(Error::shape(
                format!("{} bytes ({} rows x {} {})", expected, rows, self.width, self.dtype),
                format!("{} bytes", bytes.len()),
            ));
        }
        self.replace_chunk(index, bytes)
    }

    fn replace_chunk(&mut self, index: usize, raw: &[u8]) -> Result<()> {
        let rows = self.chunk_rows(index)?;
        let chunk = Chunk::from_raw(
            raw,
            self.dtype,
            rows,
            self.width,
            self.options.codec,
            self.options.level,
            self.options.requested_block_size(),
        )?;
        trace!(index, compressed = chunk.compressed_size(), "replaced chunk");
        self.chunks[index] = chunk;
        Ok(())
    }

    /// Decompress chunk `index`, let `f` edit its rows, then recompress.
    ///
    /// If `f` fails the chunk is left as it was.
    pub fn update_chunk<T, F>(&mut self, index: usize, f: F) -> Result<()>
    where
        T: Element,
        F: FnOnce(&mut [T]) -> Result<()>,
    {
        let mut rows = self.get_chunk::<T>(index)?;
        f(&mut rows)?;
        self.set_chunk(index, &rows)
    }

    /// Decompress the whole channel, row-major.
    pub fn get_decompressed<T: Element>(&self) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        Ok(from_bytes(&self.get_decompressed_bytes()?))
    }

    pub fn get_decompressed_bytes(&self) -> Result<Vec<u8>> {
        let mut raw = vec![0u8; self.uncompressed_size() * self.dtype.size()];
        let mut offset = 0;
        for chunk in &self.chunks {
            let len = chunk.byte_size();
            chunk.materialize_into(&mut raw[offset..offset + len])?;
            offset += len;
        }
        Ok(raw)
    }

    /// Decompress only the chunks covering `rows` and return exactly those rows.
    pub fn get_rows<T: Element>(&self, rows: Range<usize>) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        Ok(from_bytes(&self.get_rows_bytes(rows)?))
    }

    pub fn get_rows_bytes(&self, rows: Range<usize>) -> Result<Vec<u8>> {
        if rows.start > rows.end {
            return Err(Error::shape(
                "an ascending row range",
                format!("{}..{}", rows.start, rows.end),
            ));
        }
        if rows.end > self.height {
            return Err(Error::index("row", rows.end - 1, self.height));
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let row_bytes = self.row_bytes();
        let rows_per_chunk = self.rows_per_chunk();
        let first_chunk = rows.start / rows_per_chunk;
        let last_chunk = (rows.end - 1) / rows_per_chunk;

        let mut result = Vec::with_capacity(rows.len() * row_bytes);
        for index in first_chunk..=last_chunk {
            let raw = self.get_chunk_bytes(index)?;
            let chunk_start = index * rows_per_chunk;
            let from = rows.start.max(chunk_start) - chunk_start;
            let to = rows.end.min(chunk_start + rows_per_chunk) - chunk_start;
            result.extend_from_slice(&raw[from * row_bytes..to * row_bytes]);
        }
        Ok(result)
    }
}
