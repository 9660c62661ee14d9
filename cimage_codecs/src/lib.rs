//! Codec registry for chunked image storage.
//!
//! [`compress`] turns one raw chunk into a self-describing frame (see
//! [`format::FrameHeader`]): the chunk is split into blocks, every block is
//! byte-shuffled by element size and compressed independently with the
//! backend selected by [`backend`]. [`decompress`] reverses this and rejects
//! any frame that does not check out with [`CodecError::Corrupt`].

pub mod codec;
mod deflate_codec;
pub mod error;
pub mod format;
mod lz4_codec;
mod passthrough;
pub mod shuffle;
mod zstd_codec;

pub use codec::{BlockCodec, Codec, MAX_LEVEL};
pub use deflate_codec::DeflateCodec;
pub use error::{CodecError, Result};
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use tracing::trace;
use format::{
    effective_block_len, frame_checksum, read_u32, FrameHeader, BLOCK_ENTRY_SIZE, FLAG_SHUFFLE, FRAME_VERSION,
    HEADER_SIZE, MAX_BLOCK_SIZE, STORED_BIT,
};

static PASSTHROUGH: PassThroughCodec = PassThroughCodec;
static BLOSCLZ: DeflateCodec = DeflateCodec;
static LZ4: Lz4Codec = Lz4Codec::FAST;
static LZ4HC: Lz4Codec = Lz4Codec::HIGH_COMPRESSION;
static ZSTD: ZstdCodec = ZstdCodec;

/// Resolve the block backend for a codec/level pair.
///
/// Level 0 always stores blocks verbatim.
pub fn backend(codec: Codec, level: u8) -> &'static dyn BlockCodec {
    if level == 0 {
        return &PASSTHROUGH;
    }
    match codec {
        Codec::Blosclz => &BLOSCLZ,
        Codec::Lz4 => &LZ4,
        Codec::Lz4hc => &LZ4HC,
        Codec::Zstd => &ZSTD,
    }
}

/// Check a block size before it reaches [`compress`].
pub fn validate_block_size(block_size: usize) -> Result<usize> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(CodecError::InvalidBlockSize {
            size: block_size,
            max: MAX_BLOCK_SIZE,
        });
    }
    Ok(block_size)
}

/// Compress one raw chunk into a chunk frame.
///
/// `typesize` is the element size in bytes and drives the shuffle filter;
/// `block_size` is the nominal number of raw bytes compressed per block.
pub fn compress(
    codec: Codec,
    level: u8,
    typesize: usize,
    block_size: usize,
    raw: &[u8],
) -> Result<Vec<u8>> {
    codec.validate_level(level)?;
    validate_block_size(block_size)?;
    let typesize_u8 = u8::try_from(typesize)
        .ok()
        .filter(|&t| t > 0)
        .ok_or(CodecError::InvalidTypeSize(typesize))?;
    let raw_len = u32::try_from(raw.len()).map_err(|_| CodecError::TooLarge(raw.len()))?;

    let block_len = effective_block_len(block_size, typesize);
    let backend = backend(codec, level);
    let block_count = raw.len().div_ceil(block_len);

    let mut table = Vec::with_capacity(block_count * BLOCK_ENTRY_SIZE);
    let mut blocks = Vec::with_capacity(raw.len() / 2);
    let mut shuffled = vec![0u8; block_len.min(raw.len())];

    for block in raw.chunks(block_len) {
        let shuffled = &mut shuffled[..block.len()];
        shuffle::shuffle(block, typesize, shuffled);
        let compressed = backend.compress_block(shuffled, level)?;
        // Blocks that do not shrink are kept verbatim, so a frame is never much
        // larger than its raw chunk.
        let entry = if compressed.len() < block.len() {
            blocks.extend_from_slice(&compressed);
            compressed.len() as u32
        } else {
            blocks.extend_from_slice(shuffled);
            block.len() as u32 | STORED_BIT
        };
        table.extend_from_slice(&entry.to_le_bytes());
    }

    let mut payload = table;
    payload.extend_from_slice(&blocks);

    let mut header = FrameHeader {
        version: FRAME_VERSION,
        codec_id: codec.id(),
        level,
        typesize: typesize_u8,
        flags: if typesize > 1 { FLAG_SHUFFLE } else { 0 },
        raw_len,
        block_size: block_len as u32,
        block_count: block_count as u32,
        checksum: 0,
    };
    header.checksum = frame_checksum(&header.to_bytes(), &payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&payload);

    trace!(
        codec = codec.name(),
        level,
        raw = raw.len(),
        compressed = frame.len(),
        blocks = block_count,
        "compressed chunk"
    );
    Ok(frame)
}

/// Decompress a chunk frame produced by [`compress`] with `codec`.
///
/// `typesize` and `expected_len` are the element size and raw length the
/// caller knows the chunk must have; a frame disagreeing with either is
/// corrupt.
pub fn decompress(
    codec: Codec,
    typesize: usize,
    compressed: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; expected_len];
    decompress_into(codec, typesize, compressed, &mut raw)?;
    Ok(raw)
}

/// Decompress a chunk frame into `out`, whose length is the expected raw length.
pub fn decompress_into(
    codec: Codec,
    typesize: usize,
    compressed: &[u8],
    out: &mut [u8],
) -> Result<()> {
    let header = FrameHeader::from_bytes(compressed)?;

    if header.codec_id != codec.id() {
        let found = Codec::from_id(header.codec_id)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("unknown id {}", header.codec_id));
        return Err(CodecError::Corrupt(format!(
            "codec mismatch: frame was written with {} but {} was requested",
            found, codec
        )));
    }
    if header.raw_len as usize != out.len() {
        return Err(CodecError::Corrupt(format!(
            "frame holds {} raw bytes but {} were expected",
            header.raw_len,
            out.len()
        )));
    }

    if header.typesize as usize != typesize {
        return Err(CodecError::Corrupt(format!(
            "frame holds {}-byte elements but {}-byte elements were expected",
            header.typesize, typesize
        )));
    }

    let (head, payload) = compressed.split_at(HEADER_SIZE);
    let computed = frame_checksum(head, payload);
    if computed != header.checksum {
        return Err(CodecError::Corrupt(format!(
            "checksum mismatch: expected {:016x}, got {:016x}",
            header.checksum, computed
        )));
    }
    if header.has_flag(FLAG_SHUFFLE) != (typesize > 1) {
        return Err(CodecError::Corrupt(format!(
            "shuffle flag does not match {}-byte elements",
            typesize
        )));
    }

    let block_len = header.block_size as usize;
    let block_count = header.block_count as usize;
    let expected_blocks = out.len().div_ceil(block_len);
    if block_count != expected_blocks {
        return Err(CodecError::Corrupt(format!(
            "frame declares {} blocks but {} raw bytes in blocks of {} need {}",
            block_count,
            out.len(),
            block_len,
            expected_blocks
        )));
    }

    let table_len = block_count * BLOCK_ENTRY_SIZE;
    let table = payload.get(..table_len).ok_or_else(|| {
        CodecError::Corrupt(format!(
            "block table of {} bytes is truncated ({} bytes available)",
            table_len,
            payload.len()
        ))
    })?;

    let backend = backend(codec, header.level);
    let shuffled_typesize = if header.has_flag(FLAG_SHUFFLE) { typesize } else { 1 };
    let mut cursor = table_len;

    for (idx, (entry, raw_block)) in table
        .chunks_exact(BLOCK_ENTRY_SIZE)
        .zip(out.chunks_mut(block_len))
        .enumerate()
    {
        let entry = read_u32(entry);
        let stored = entry & STORED_BIT != 0;
        let len = (entry & !STORED_BIT) as usize;
        let block = payload.get(cursor..cursor + len).ok_or_else(|| {
            CodecError::Corrupt(format!(
                "block {} ({} bytes at offset {}) runs past the end of the frame",
                idx, len, cursor
            ))
        })?;
        cursor += len;

        let decoded = if stored {
            PASSTHROUGH.decompress_block(block, raw_block.len())?
        } else {
            backend.decompress_block(block, raw_block.len())?
        };
        if decoded.len() != raw_block.len() {
            return Err(CodecError::Corrupt(format!(
                "block {} decompressed to {} bytes but {} were expected",
                idx,
                decoded.len(),
                raw_block.len()
            )));
        }
        shuffle::unshuffle(&decoded, shuffled_typesize, raw_block);
    }

    if cursor != payload.len() {
        return Err(CodecError::Corrupt(format!(
            "{} trailing bytes after the last block",
            payload.len() - cursor
        )));
    }
    Ok(())
}
