//! Write-ahead-log (WAL) extraction for the LevelDB log format.
//!
//! Writes not yet compacted into a sorted table live in an append-only
//! log. The log is framed into fixed 32 KiB physical blocks; a logical
//! record (one write batch) is stored either whole or fragmented across
//! block boundaries, because a record header never straddles two blocks.
//!
//! # On-disk layout
//!
//! ```text
//! physical block = 32768 bytes
//! record         = checksum (4 B, decoded, unverified)
//!                  ‖ length (u16 LE) ‖ type (1 B) ‖ payload[length]
//! type           = 1 FULL ‖ 2 FIRST ‖ 3 MIDDLE ‖ 4 LAST
//! ```
//!
//! `FULL` payloads decode directly as one write batch; `FIRST…MIDDLE*…LAST`
//! sequences are concatenated and then decoded as one. Block-tail padding
//! shorter than a header is skipped.
//!
//! # Guarantees
//!
//! - [`entries_from_file`] never fails its caller: an unreadable file
//!   contributes zero entries, and framing corruption discards at most
//!   the record sequence it interrupted.
//! - A dangling fragment sequence (no `LAST` before corruption, padding,
//!   or end of file) is dropped whole, never decoded partially.
//! - Every decodable put is returned; deletions are decoded and dropped,
//!   never used to suppress earlier puts (see [`batch`]).

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

pub(crate) mod batch;

use std::{fs, path::Path};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::Entry;
use crate::format;
use crate::varint::VarintError;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Fixed size of one physical log block.
pub(crate) const LOG_BLOCK_SIZE: usize = 32768;

/// Record header: 4-byte stored checksum + 2-byte length + 1-byte type.
pub(crate) const LOG_HEADER_SIZE: usize = 7;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Reasons a log record or write batch stops decoding.
///
/// These never cross the module boundary: every one of them is degraded
/// to a skip at record or batch granularity, logged with its cause.
#[derive(Debug, Error)]
pub(crate) enum WalError {
    /// Record type byte outside the closed `FULL..LAST` set.
    #[error("unknown record type {0}")]
    UnknownRecordType(u8),

    /// Write batch shorter than its 12-byte sequence/count header.
    #[error("batch too short for a header ({0} bytes)")]
    BatchTooShort(usize),

    /// Batch record tag outside the closed put/delete set.
    #[error("unknown batch record tag {0}")]
    UnknownTag(u8),

    /// A length-prefix varint inside a batch record was malformed.
    #[error("batch record prefix: {0}")]
    Varint(#[from] VarintError),

    /// A batch record's body runs past the end of the batch.
    #[error("batch record needs bytes up to {need}, batch ends at {have}")]
    RecordOverrun { need: u64, have: usize },
}

// ------------------------------------------------------------------------------------------------
// Record types
// ------------------------------------------------------------------------------------------------

/// Physical record types, as stored in the header's type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordType {
    /// A whole write batch in one record.
    Full = 1,

    /// Opening fragment of a batch that spans block boundaries.
    First = 2,

    /// Interior fragment.
    Middle = 3,

    /// Closing fragment; completes the batch.
    Last = 4,
}

impl TryFrom<u8> for RecordType {
    type Error = WalError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            other => Err(WalError::UnknownRecordType(other)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Log extraction
// ------------------------------------------------------------------------------------------------

/// Extract every decodable put from the log file at `path`.
///
/// Never fails: an unreadable or malformed file contributes zero
/// entries, with the cause logged.
pub(crate) fn entries_from_file(path: &Path) -> Vec<Entry> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            debug!(path = %path.display(), %err, "log unreadable; contributing no entries");
            return Vec::new();
        }
    };
    trace!(path = %path.display(), len = data.len(), "log read");
    entries_from_bytes(&data)
}

/// Extract every decodable put from an in-memory log image.
pub(crate) fn entries_from_bytes(data: &[u8]) -> Vec<Entry> {
    let mut entries = Vec::new();
    // Pending FIRST…MIDDLE* payloads awaiting their LAST.
    let mut fragments: Option<Vec<u8>> = None;
    let mut pos = 0;

    while pos < data.len() {
        let block_end = (pos / LOG_BLOCK_SIZE + 1) * LOG_BLOCK_SIZE;

        // Headers never straddle block boundaries; a tail shorter than a
        // header is writer padding. A fragment sequence left open across
        // it was torn and cannot complete.
        if block_end - pos < LOG_HEADER_SIZE {
            if fragments.take().is_some() {
                debug!(pos, "block-tail padding reached with open fragments; discarding them");
            }
            pos = block_end;
            continue;
        }
        if pos + LOG_HEADER_SIZE > data.len() {
            if fragments.take().is_some() {
                debug!(pos, "file ends inside a record header; discarding open fragments");
            }
            break;
        }

        let stored_crc = format::u32_le(data, pos);
        let length = format::u16_le(data, pos + 4) as usize;
        let type_byte = data[pos + 6];
        let payload_start = pos + LOG_HEADER_SIZE;

        // A zero length or a payload running past the file marks a
        // corruption boundary; everything up to the next physical block
        // is untrustworthy.
        if length == 0 || payload_start + length > data.len() {
            debug!(
                pos,
                length,
                file_len = data.len(),
                "implausible record length; resuming at next block boundary"
            );
            fragments = None;
            pos = block_end;
            continue;
        }

        let payload = &data[payload_start..payload_start + length];
        format::note_checksum(stored_crc, payload);
        pos = payload_start + length;

        match RecordType::try_from(type_byte) {
            Ok(RecordType::Full) => {
                if fragments.take().is_some() {
                    debug!(pos, "FULL record arrived with open fragments; discarding them");
                }
                batch::decode_batch(payload, &mut entries);
            }
            Ok(RecordType::First) => {
                if fragments.is_some() {
                    debug!(pos, "FIRST record arrived with open fragments; restarting sequence");
                }
                fragments = Some(payload.to_vec());
            }
            Ok(RecordType::Middle) => match fragments.as_mut() {
                Some(pending) => pending.extend_from_slice(payload),
                // An orphaned fragment has no FIRST to attach to.
                None => trace!(pos, "MIDDLE record with no open sequence; dropped"),
            },
            Ok(RecordType::Last) => match fragments.take() {
                Some(mut pending) => {
                    pending.extend_from_slice(payload);
                    batch::decode_batch(&pending, &mut entries);
                }
                None => trace!(pos, "LAST record with no open sequence; dropped"),
            },
            Err(err) => {
                // Framing corruption at record granularity: the payload
                // was already consumed, the walk resumes right after it.
                warn!(pos, %err, "discarding open fragments and continuing");
                fragments = None;
            }
        }
    }

    entries
}
