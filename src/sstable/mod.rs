//! Sorted-table (SSTable) extraction for the LevelDB on-disk format.
//!
//! Tables are immutable files of key-ordered entries grouped into blocks,
//! addressed by an index block, terminated by a fixed footer. This module
//! reads one table end-to-end and returns every entry it can decode; it
//! never seeks, merges, or deduplicates.
//!
//! # On-disk layout
//!
//! ```text
//! [data block ‖ trailer]…
//! [metaindex block ‖ trailer]
//! [index block ‖ trailer]
//! [footer (48 B)]
//!
//! trailer = compressionTag (1 B) ‖ checksum (4 B, decoded, unverified)
//! footer  = metaindexHandle ‖ indexHandle ‖ zero padding to byte 40
//!           ‖ magic[8] = 57 FB 80 8B 24 75 47 DB
//! handle  = varint64(offset) ‖ varint64(size)
//! ```
//!
//! Each index-block entry's *value* is itself an encoded handle locating
//! one data block. The metaindex handle is decoded (the footer layout
//! requires it) and then discarded: filters and table properties play no
//! part in exhaustive extraction.
//!
//! # Guarantees
//!
//! - [`entries_from_file`] never fails its caller: unreadable, undersized,
//!   or foreign files contribute zero entries, and a corrupt data block is
//!   skipped without affecting its neighbors.
//! - Entries are returned in index order, then block order, exactly as
//!   encountered.
//! - Source files are opened read-only and never mutated.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub(crate) mod block;


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{fs, io, path::Path};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::Entry;
use crate::format;
use crate::varint::{self, VarintError};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Fixed footer length at the end of every table file.
pub(crate) const FOOTER_SIZE: usize = 48;

/// Footer magic, final 8 bytes of the file.
pub(crate) const TABLE_MAGIC: [u8; 8] = [0x57, 0xfb, 0x80, 0x8b, 0x24, 0x75, 0x47, 0xdb];

/// Per-block trailer: 1-byte compression tag + 4-byte stored checksum.
pub(crate) const BLOCK_TRAILER_SIZE: usize = 5;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors raised while decoding a table file.
///
/// These never cross the module boundary: [`entries_from_file`] degrades
/// every one of them to an empty or partial result, logging the cause.
#[derive(Debug, Error)]
pub enum TableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File is shorter than a footer.
    #[error("file too short for a footer ({0} bytes)")]
    TooShort(usize),

    /// Final 8 bytes are not the table magic.
    #[error("footer magic mismatch")]
    BadMagic,

    /// A varint field could not be decoded.
    #[error("varint: {0}")]
    Varint(#[from] VarintError),

    /// A block's byte range (trailer included) falls outside the readable
    /// region.
    #[error("block range {offset}..{end} exceeds readable length {limit}")]
    BlockOutOfRange {
        /// Block start offset.
        offset: u64,
        /// One past the trailer's final byte.
        end: u64,
        /// Readable region the range was checked against.
        limit: u64,
    },

    /// Trailer tag outside the closed compression set.
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),

    /// Snappy frame rejected by the decoder.
    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),
}

// ------------------------------------------------------------------------------------------------
// On-disk format structures
// ------------------------------------------------------------------------------------------------

/// Byte range of one block within a table file.
///
/// Offsets and sizes are stored as varint64 but decoded through the
/// truncating reader: segment files this crate targets stay far below 4 GiB
/// (see [`varint::decode_u64_truncated`]).
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockHandle {
    /// Offset of the block's first byte.
    pub(crate) offset: u32,

    /// Byte length of the block, trailer excluded.
    pub(crate) size: u32,
}

impl BlockHandle {
    /// Decode a handle from the front of `buf`, returning it with the
    /// number of bytes consumed.
    pub(crate) fn decode(buf: &[u8]) -> Result<(Self, usize), VarintError> {
        let (offset, n_offset) = varint::decode_u64_truncated(buf)?;
        let (size, n_size) = varint::decode_u64_truncated(&buf[n_offset..])?;
        Ok((Self { offset, size }, n_offset + n_size))
    }
}

/// Decoded table footer: the two leading handles.
///
/// The padding and magic that complete the 48 bytes are validated by the
/// caller before decoding reaches this point.
struct Footer {
    /// Handle of the metaindex block; decoded and then ignored.
    metaindex: BlockHandle,

    /// Handle of the index block.
    index: BlockHandle,
}

impl Footer {
    /// Decode both handles from the footer's first bytes.
    fn decode(footer: &[u8]) -> Result<Self, VarintError> {
        let (metaindex, consumed) = BlockHandle::decode(footer)?;
        let (index, _) = BlockHandle::decode(&footer[consumed..])?;
        Ok(Self { metaindex, index })
    }
}

// ------------------------------------------------------------------------------------------------
// Table extraction
// ------------------------------------------------------------------------------------------------

/// Extract every decodable entry from the table file at `path`.
///
/// Never fails: an unreadable or malformed file contributes zero entries,
/// with the cause logged.
pub(crate) fn entries_from_file(path: &Path) -> Vec<Entry> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            debug!(path = %path.display(), %err, "table unreadable; contributing no entries");
            return Vec::new();
        }
    };
    trace!(path = %path.display(), len = data.len(), "table read");
    entries_from_bytes(&data)
}

/// Extract every decodable entry from an in-memory table image.
pub(crate) fn entries_from_bytes(data: &[u8]) -> Vec<Entry> {
    match parse_table(data) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(%err, "table rejected; contributing no entries");
            Vec::new()
        }
    }
}

/// Footer → index block → data blocks.
///
/// Failures up to and including the index block abort the file (`Err`);
/// failures inside one data block skip that block only.
fn parse_table(data: &[u8]) -> Result<Vec<Entry>, TableError> {
    if data.len() < FOOTER_SIZE {
        return Err(TableError::TooShort(data.len()));
    }
    if data[data.len() - TABLE_MAGIC.len()..] != TABLE_MAGIC {
        return Err(TableError::BadMagic);
    }

    let footer = Footer::decode(&data[data.len() - FOOTER_SIZE..])?;
    trace!(
        metaindex_offset = footer.metaindex.offset,
        metaindex_size = footer.metaindex.size,
        index_offset = footer.index.offset,
        index_size = footer.index.size,
        "footer decoded; metaindex not consulted"
    );

    // The index block must sit strictly before the footer.
    let index_data = read_block(data, &footer.index, data.len() - FOOTER_SIZE)?;
    let index_entries = block::parse_block(&index_data);

    let mut entries = Vec::new();
    for (ordinal, index_entry) in index_entries.iter().enumerate() {
        let handle = match BlockHandle::decode(&index_entry.value) {
            Ok((handle, _)) => handle,
            Err(err) => {
                warn!(ordinal, %err, "index entry holds no decodable handle; skipping block");
                continue;
            }
        };
        // Data block ranges are checked against the whole file length.
        match read_block(data, &handle, data.len()) {
            Ok(block_data) => entries.extend(block::parse_block(&block_data)),
            Err(err) => {
                warn!(ordinal, %err, "data block rejected; skipping");
            }
        }
    }

    Ok(entries)
}

/// Slice out one block by handle, record its trailer fields, and return the
/// decompressed payload.
///
/// `limit` is the end of the readable region the block (trailer included)
/// must fit within.
fn read_block(data: &[u8], handle: &BlockHandle, limit: usize) -> Result<Vec<u8>, TableError> {
    let offset = u64::from(handle.offset);
    let end = offset + u64::from(handle.size) + BLOCK_TRAILER_SIZE as u64;
    if end > limit as u64 {
        return Err(TableError::BlockOutOfRange {
            offset,
            end,
            limit: limit as u64,
        });
    }

    let payload_start = handle.offset as usize;
    let payload_end = payload_start + handle.size as usize;
    let payload = &data[payload_start..payload_end];
    let tag = data[payload_end];
    let stored_crc = format::u32_le(data, payload_end + 1);
    format::note_checksum(stored_crc, payload);

    block::decompress(tag, payload)
}
