use std::ops::Range;

use xxhash_rust::xxh3::Xxh3;

use crate::error::{CodecError, Result};

/// Magic bytes opening every chunk frame.
pub const MAGIC: &[u8; 4] = b"CIMG";

/// Current chunk frame version.
pub const FRAME_VERSION: u8 = 1;

/// Fixed size of the chunk frame header in bytes.
///   magic[4] + version:u8 + codec_id:u8 + level:u8 + typesize:u8
///   + flags:u8 + reserved[3] + raw_len:u32 + block_size:u32
///   + block_count:u32 + checksum:u64
///   = 4 + 4 + 1 + 3 + 4 + 4 + 4 + 8 = 32
pub const HEADER_SIZE: usize = 32;

/// Size of each entry in the block table, in bytes (u32 LE compressed length).
pub const BLOCK_ENTRY_SIZE: usize = 4;

/// Block-table bit marking a block stored verbatim because compression did
/// not shrink it.
pub const STORED_BIT: u32 = 1 << 31;

/// Largest accepted block size. Keeps every block length clear of `STORED_BIT`.
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

// ── Flags ──────────────────────────────────────────────────────────────────

/// Blocks were byte-shuffled by `typesize` before compression.
pub const FLAG_SHUFFLE: u8 = 1 << 0;

const KNOWN_FLAGS: u8 = FLAG_SHUFFLE;

/// Header bytes covered by the checksum: everything between the magic and
/// the checksum field itself.
pub const CHECKED_HEADER: Range<usize> = 4..24;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 32-byte chunk frame header.
///
/// ```text
/// [HEADER: 32 bytes]
/// [BLOCK TABLE: 4 bytes × block_count]
/// [BLOCK 0] [BLOCK 1] ... [BLOCK N-1]   ← independently compressed blocks
/// ```
/// The checksum covers header bytes `4..24` and everything after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub codec_id: u8,
    pub level: u8,
    pub typesize: u8,
    pub flags: u8,
    /// Uncompressed length of the whole chunk.
    pub raw_len: u32,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub block_size: u32,
    pub block_count: u32,
    /// xxhash3-64 of the checked header bytes, the block table and the blocks.
    pub checksum: u64,
}

impl FrameHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        buf[5] = self.codec_id;
        buf[6] = self.level;
        buf[7] = self.typesize;
        buf[8] = self.flags;
        // reserved[3] stays zero
        buf[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.block_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.block_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize from the start of `frame`, checking length, magic and version.
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        let buf = frame.get(..HEADER_SIZE).ok_or_else(|| {
            CodecError::Corrupt(format!(
                "frame of {} bytes is shorter than the {}-byte header",
                frame.len(),
                HEADER_SIZE
            ))
        })?;
        if &buf[..4] != MAGIC {
            return Err(CodecError::Corrupt("invalid chunk frame magic bytes".to_string()));
        }
        if buf[9..12] != [0, 0, 0] {
            return Err(CodecError::Corrupt("reserved header bytes are not zero".to_string()));
        }
        let header = Self {
            version: buf[4],
            codec_id: buf[5],
            level: buf[6],
            typesize: buf[7],
            flags: buf[8],
            raw_len: read_u32(&buf[12..16]),
            block_size: read_u32(&buf[16..20]),
            block_count: read_u32(&buf[20..24]),
            checksum: u64::from_le_bytes([
                buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
            ]),
        };
        if header.version != FRAME_VERSION {
            return Err(CodecError::Corrupt(format!(
                "unsupported chunk frame version {} (only version {} is supported)",
                header.version, FRAME_VERSION
            )));
        }
        if header.flags & !KNOWN_FLAGS != 0 {
            return Err(CodecError::Corrupt(format!(
                "unknown frame flags {:#04x}",
                header.flags & !KNOWN_FLAGS
            )));
        }
        if header.typesize == 0 || header.block_size == 0 {
            return Err(CodecError::Corrupt(format!(
                "frame header declares typesize {} and block size {}",
                header.typesize, header.block_size
            )));
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// Checksum of a frame given its serialized header and its payload.
///
/// `header` must be at least `HEADER_SIZE` bytes; the checksum field itself
/// is not hashed.
pub fn frame_checksum(header: &[u8], payload: &[u8]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&header[CHECKED_HEADER]);
    hasher.update(payload);
    hasher.digest()
}

pub(crate) fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Raw bytes per block for a requested `block_size` and element size: rounded
/// down to whole elements, never below one element.
pub fn effective_block_len(block_size: usize, typesize: usize) -> usize {
    (block_size - block_size % typesize).max(typesize)
}
