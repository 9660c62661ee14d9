use std::sync::Arc;

use cimage_codecs::Codec;

use crate::dtype::{ElementType, Scalar};
use crate::error::{Error, Result};

/// Compressed storage for one run of whole rows of a channel.
///
/// A chunk is an immutable value: editing a channel swaps in a new chunk
/// rather than touching an existing one. Both variants materialize to exactly
/// `rows * row_width` elements, so callers never need to know which one they
/// hold.
#[derive(Debug, Clone)]
pub enum Chunk {
    /// Real compressed bytes (a chunk frame).
    Dense(DenseChunk),
    /// A constant fill value, expanded only when read.
    Lazy(LazyChunk),
}

#[derive(Debug, Clone)]
pub struct DenseChunk {
    frame: Arc<[u8]>,
    dtype: ElementType,
    rows: usize,
    row_width: usize,
    codec: Codec,
    level: u8,
}

impl DenseChunk {
    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// The compressed frame bytes.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LazyChunk {
    fill: Scalar,
    rows: usize,
    row_width: usize,
}

impl Chunk {
    /// Compress `raw` (native-endian bytes of `dtype`) into a dense chunk.
    pub fn from_raw(
        raw: &[u8],
        dtype: ElementType,
        rows: usize,
        row_width: usize,
        codec: Codec,
        level: u8,
        block_size: usize,
    ) -> Result<Chunk> {
        let expected = rows * row_width * dtype.size();
        if raw.len() != expected {
            return Err(Error::shape(
                format!("{} bytes ({} rows x {} {})", expected, rows, row_width, dtype),
                format!("{} bytes", raw.len()),
            ));
        }
        let frame = cimage_codecs::compress(codec, level, dtype.size(), block_size, raw)?;
        Ok(Chunk::Dense(DenseChunk {
            frame: frame.into(),
            dtype,
            rows,
            row_width,
            codec,
            level,
        }))
    }

    /// A lazy chunk of `rows` rows filled with `fill`. Costs O(1) regardless of size.
    pub fn constant(fill: Scalar, rows: usize, row_width: usize) -> Chunk {
        Chunk::Lazy(LazyChunk {
            fill,
            rows,
            row_width,
        })
    }

    pub fn dtype(&self) -> ElementType {
        match self {
            Chunk::Dense(dense) => dense.dtype,
            Chunk::Lazy(lazy) => lazy.fill.dtype(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            Chunk::Dense(dense) => dense.rows,
            Chunk::Lazy(lazy) => lazy.rows,
        }
    }

    pub fn row_width(&self) -> usize {
        match self {
            Chunk::Dense(dense) => dense.row_width,
            Chunk::Lazy(lazy) => lazy.row_width,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.rows() * self.row_width()
    }

    /// Uncompressed size in bytes.
    pub fn byte_size(&self) -> usize {
        self.num_elements() * self.dtype().size()
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Chunk::Lazy(_))
    }

    /// The fill value of a lazy chunk.
    pub fn fill_value(&self) -> Option<Scalar> {
        match self {
            Chunk::Dense(_) => None,
            Chunk::Lazy(lazy) => Some(lazy.fill),
        }
    }

    /// Bytes this chunk occupies in memory; a lazy chunk counts as one element.
    pub fn compressed_size(&self) -> usize {
        match self {
            Chunk::Dense(dense) => dense.frame.len(),
            Chunk::Lazy(lazy) => lazy.fill.dtype().size(),
        }
    }

    /// Produce the raw row buffer, decompressing or filling as needed.
    pub fn materialize(&self) -> Result<Vec<u8>> {
        let mut raw = vec![0u8; self.byte_size()];
        self.materialize_into(&mut raw)?;
        Ok(raw)
    }

    /// Like [`Chunk::materialize`] but writes into `out`, which must be
    /// exactly [`Chunk::byte_size`] bytes long.
    pub fn materialize_into(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != self.byte_size() {
            return Err(Error::shape(
                format!("{} bytes", self.byte_size()),
                format!("{} bytes", out.len()),
            ));
        }
        match self {
            Chunk::Dense(dense) => {
                cimage_codecs::decompress_into(dense.codec, dense.dtype.size(), &dense.frame, out)?;
            }
            Chunk::Lazy(lazy) => lazy.fill.fill_bytes(out),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{as_bytes, from_bytes};

    #[test]
    fn dense_chunk_materializes_its_input() {
        let rows: Vec<u16> = (0..4 * 16).map(|v| v * 3).collect();
        let chunk = Chunk::from_raw(as_bytes(&rows), ElementType::U16, 4, 16, Codec::Zstd, 5, 64)
            .unwrap();
        assert!(!chunk.is_lazy());
        assert_eq!(chunk.num_elements(), 64);
        assert_eq!(chunk.byte_size(), 128);
        assert_eq!(from_bytes::<u16>(&chunk.materialize().unwrap()), rows);
    }

    #[test]
    fn lazy_chunk_is_constant_and_tiny() {
        let chunk = Chunk::constant(Scalar::F32(25.0), 1000, 1000);
        assert!(chunk.is_lazy());
        assert_eq!(chunk.compressed_size(), 4);
        assert_eq!(chunk.fill_value(), Some(Scalar::F32(25.0)));

        let small = Chunk::constant(Scalar::I8(-3), 2, 5);
        assert_eq!(from_bytes::<i8>(&small.materialize().unwrap()), vec![-3i8; 10]);
    }

    #[test]
    fn raw_length_must_match_geometry() {
        let err = Chunk::from_raw(&[0u8; 10], ElementType::U16, 1, 8, Codec::Lz4, 5, 64).unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));
    }

    fn tampered(chunk: &Chunk, edit: impl FnOnce(&mut Vec<u8>)) -> Chunk {
        let Chunk::Dense(dense) = chunk else {
            panic!("expected a dense chunk");
        };
        let mut frame = dense.frame.to_vec();
        edit(&mut frame);
        Chunk::Dense(DenseChunk {
            frame: frame.into(),
            ..dense.clone()
        })
    }

    #[test]
    fn corrupt_frames_surface_as_corrupt_data() {
        let rows: Vec<u16> = (0..8 * 32).map(|v| v * 7).collect();
        let chunk = Chunk::from_raw(as_bytes(&rows), ElementType::U16, 8, 32, Codec::Lz4, 5, 128)
            .unwrap();

        let edits: [(&str, fn(&mut Vec<u8>)); 5] = [
            ("payload", |f| {
                let last = f.len() - 1;
                f[last] ^= 0xFF;
            }),
            ("typesize", |f| f[7] = 4),
            ("shuffle flag", |f| f[8] = 0),
            ("level", |f| f[6] = 9),
            ("truncated", |f| f.truncate(20)),
        ];
        for (what, edit) in edits {
            let bad = tampered(&chunk, edit);
            assert!(
                matches!(bad.materialize(), Err(Error::CorruptData(_))),
                "{what} tampering was not detected"
            );
        }
    }

    #[test]
    fn frame_with_other_element_size_is_corrupt() {
        let rows = vec![9u8; 64];
        let chunk = Chunk::from_raw(&rows, ElementType::U8, 4, 16, Codec::Zstd, 3, 64).unwrap();
        let Chunk::Dense(dense) = chunk else {
            panic!("expected a dense chunk");
        };
        // Same byte length, but read back as 16-bit elements.
        let relabeled = Chunk::Dense(DenseChunk {
            dtype: ElementType::U16,
            row_width: 8,
            ..dense
        });
        assert!(matches!(relabeled.materialize(), Err(Error::CorruptData(_))));
    }

    #[test]
    fn materialize_into_checks_buffer_length() {
        let chunk = Chunk::constant(Scalar::U8(1), 2, 4);
        let mut wrong = vec![0u8; 7];
        assert!(matches!(chunk.materialize_into(&mut wrong), Err(Error::Shape { .. })));
        let mut right = vec![0u8; 8];
        chunk.materialize_into(&mut right).unwrap();
        assert_eq!(right, vec![1u8; 8]);
    }
}
