use tracing::{debug, trace};

use crate::channel::Channel;
use crate::chunk::Chunk;
use crate::dtype::{as_bytes, Element, ElementType};
use crate::error::{Error, Result};
use crate::options::{checked_bytes, ChannelOptions};

/// Append-only row ingestion for a [`Channel`].
///
/// # Push contract
/// Call [`push_rows`](Self::push_rows) any number of times with whole rows.
/// The builder accumulates rows and compresses an independent dense chunk
/// whenever a full chunk's worth of rows has been gathered. Call
/// [`finish`](Self::finish) to flush the trailing partial chunk; it fails
/// unless exactly `height` rows were pushed.
///
/// This is how file readers feed a channel without ever holding more than one
/// chunk of uncompressed rows.
pub struct ChannelBuilder {
    dtype: ElementType,
    width: usize,
    height: usize,
    chunk_size: usize,
    options: ChannelOptions,
    /// Pending raw bytes not yet flushed into a chunk.
    pending: Vec<u8>,
    chunks: Vec<Chunk>,
    rows_pushed: usize,
}

impl ChannelBuilder {
    pub fn new(
        dtype: ElementType,
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
        let rows_per_chunk = chunk_size / (width * dtype.size());
        Ok(Self {
            dtype,
            width,
            height,
            chunk_size,
            options,
            pending: Vec::new(),
            chunks: Vec::with_capacity(height.div_ceil(rows_per_chunk)),
            rows_pushed: 0,
        })
    }

    /// Number of rows that make up one full chunk.
    pub fn rows_per_chunk(&self) -> usize {
        self.chunk_size / self.row_bytes()
    }

    pub fn rows_pushed(&self) -> usize {
        self.rows_pushed
    }

    fn row_bytes(&self) -> usize {
        self.width * self.dtype.size()
    }

    /// Append whole rows of typed pixel data.
    pub fn push_rows<T: Element>(&mut self, rows: &[T]) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(Error::InvalidType(format!(
                "channel stores {} but {} rows were pushed",
                self.dtype,
                T::DTYPE
            )));
        }
        self.push_row_bytes(as_bytes(rows))
    }

    /// Append whole rows given as native-endian bytes of the channel's type.
    pub fn push_row_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let row_bytes = self.row_bytes();
        if bytes.len() % row_bytes != 0 {
            return Err(Error::shape(
                format!("a multiple of the row size ({} bytes)", row_bytes),
                format!("{} bytes", bytes.len()),
            ));
        }
        let rows = bytes.len() / row_bytes;
        if self.rows_pushed + rows > self.height {
            return Err(Error::shape(
                format!("at most {} rows", self.height),
                format!("{} rows", self.rows_pushed + rows),
            ));
        }

        // `rows_pushed` always equals the rows in `chunks` plus those in
        // `pending`, also when a flush fails part way through.
        let mut input = bytes;
        if !self.pending.is_empty() {
            let take = (self.chunk_size - self.pending.len()).min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            self.rows_pushed += take / row_bytes;
            input = &input[take..];
            if self.pending.len() == self.chunk_size {
                let raw = std::mem::take(&mut self.pending);
                let flushed = self.flush_chunk(&raw);
                self.pending = raw;
                flushed?;
                self.pending.clear();
            }
        }
        // Full chunks straight from the input, no copy into `pending`.
        while input.len() >= self.chunk_size {
            let (raw, rest) = input.split_at(self.chunk_size);
            self.flush_chunk(raw)?;
            self.rows_pushed += self.chunk_size / row_bytes;
            input = rest;
        }
        self.rows_pushed += input.len() / row_bytes;
        self.pending.extend_from_slice(input);
        Ok(())
    }

    /// Compress `raw` as a single dense chunk.
    fn flush_chunk(&mut self, raw: &[u8]) -> Result<()> {
        let rows = raw.len() / self.row_bytes();
        let chunk = Chunk::from_raw(
            raw,
            self.dtype,
            rows,
            self.width,
            self.options.codec,
            self.options.level,
            self.options.requested_block_size(),
        )?;
        trace!(
            index = self.chunks.len(),
            rows,
            compressed = chunk.compressed_size(),
            "flushed chunk"
        );
        self.chunks.push(chunk);
        Ok(())
    }

    /// Flush the trailing partial chunk and produce the channel.
    pub fn finish(mut self) -> Result<Channel> {
        if self.rows_pushed != self.height {
            return Err(Error::shape(
                format!("{} rows", self.height),
                format!("{} rows", self.rows_pushed),
            ));
        }
        if !self.pending.is_empty() {
            let remaining = std::mem::take(&mut self.pending);
            self.flush_chunk(&remaining)?;
        }
        debug!(
            dtype = %self.dtype,
            width = self.width,
            height = self.height,
            chunks = self.chunks.len(),
            codec = %self.options.codec,
            "built channel"
        );
        Ok(Channel::from_parts(
            self.dtype,
            self.width,
            self.height,
            self.chunk_size,
            self.options,
            self.chunks,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pushed_in_odd_batches_form_whole_chunks() {
        // 3 rows per chunk, 10 rows total -> chunks of 3, 3, 3, 1.
        let options = ChannelOptions::builder().chunk_size(3 * 8).build();
        let mut builder = ChannelBuilder::new(ElementType::U8, 8, 10, options).unwrap();
        assert_eq!(builder.rows_per_chunk(), 3);

        let data: Vec<u8> = (0..80).collect();
        builder.push_rows(&data[..16]).unwrap();
        builder.push_rows(&data[16..56]).unwrap();
        builder.push_rows(&data[56..]).unwrap();
        let channel = builder.finish().unwrap();

        assert_eq!(channel.num_chunks(), 4);
        assert_eq!(channel.chunk_rows(3).unwrap(), 1);
        assert_eq!(channel.get_decompressed::<u8>().unwrap(), data);
    }

    #[test]
    fn partial_rows_are_rejected() {
        let mut builder =
            ChannelBuilder::new(ElementType::U16, 4, 2, ChannelOptions::default()).unwrap();
        assert!(matches!(builder.push_rows(&[0u16; 5]), Err(Error::Shape { .. })));
    }

    #[test]
    fn too_many_or_too_few_rows_fail() {
        let mut builder =
            ChannelBuilder::new(ElementType::U8, 4, 2, ChannelOptions::default()).unwrap();
        assert!(matches!(builder.push_rows(&[0u8; 12]), Err(Error::Shape { .. })));

        builder.push_rows(&[0u8; 4]).unwrap();
        assert!(matches!(builder.finish(), Err(Error::Shape { .. })));
    }

    #[test]
    fn pushing_the_wrong_type_fails() {
        let mut builder =
            ChannelBuilder::new(ElementType::F32, 4, 2, ChannelOptions::default()).unwrap();
        assert!(matches!(builder.push_rows(&[0u8; 4]), Err(Error::InvalidType(_))));
    }

    #[test]
    fn failed_flush_keeps_row_count_in_step_with_chunks() {
        // 2 rows per chunk, 6 rows total.
        let options = ChannelOptions::builder().chunk_size(2 * 4).build();
        let mut builder = ChannelBuilder::new(ElementType::U8, 4, 6, options).unwrap();
        let data: Vec<u8> = (0..24).collect();

        builder.push_rows(&data[..4]).unwrap();
        builder.options.level = 42;
        assert!(builder.push_rows(&data[4..12]).is_err());
        // Rows 0 and 1 wait in the pending buffer; row 2 was never accepted.
        assert_eq!(builder.rows_pushed(), 2);
        assert!(builder.chunks.is_empty());

        builder.options.level = 5;
        builder.push_rows(&data[8..]).unwrap();
        assert_eq!(builder.rows_pushed(), 6);
        let channel = builder.finish().unwrap();
        assert_eq!(channel.num_chunks(), 3);
        assert_eq!(channel.get_decompressed::<u8>().unwrap(), data);
    }

    #[test]
    fn geometry_too_large_for_memory_is_rejected() {
        let result = ChannelBuilder::new(ElementType::U8, 4, usize::MAX / 2, ChannelOptions::default());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
