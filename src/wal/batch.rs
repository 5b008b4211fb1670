//! Write-batch decoding of reassembled log payloads.
//!
//! A write batch is the atomic unit the storage engine logs: a 12-byte
//! header followed by tagged put/delete records.
//!
//! ```text
//! batch  = sequence (u64 LE) ‖ count (u32 LE) ‖ record…
//! record = tag (1 B) ‖ varint(keyLen) ‖ key
//!          ‖ [varint(valueLen) ‖ value]     — value present for put only
//! tag    = 0 delete ‖ 1 put
//! ```
//!
//! The stored record count is decoded and traced but never bounds
//! iteration: records are decoded until the buffer is exhausted or a
//! record fails, and a batch declaring fewer records than it holds still
//! yields every decodable one. Deletes are decoded to advance the cursor
//! and then dropped; extraction returns every put ever observed, so a
//! later delete never suppresses an earlier put of the same key.

use tracing::{debug, trace};

use super::WalError;
use crate::Entry;
use crate::format;
use crate::varint;

/// Batch header: 8-byte sequence number + 4-byte record count.
pub(crate) const BATCH_HEADER_SIZE: usize = 12;

/// Record tag for a deletion.
const TAG_DELETE: u8 = 0;

/// Record tag for a put.
const TAG_PUT: u8 = 1;

/// Decode one write batch, appending every put to `out`.
///
/// Never fails the caller: a decode error stops the remainder of this
/// batch only, keeping the records appended so far.
pub(crate) fn decode_batch(batch: &[u8], out: &mut Vec<Entry>) {
    if batch.len() < BATCH_HEADER_SIZE {
        let err = WalError::BatchTooShort(batch.len());
        debug!(%err, "contributing no records");
        return;
    }
    let sequence = format::u64_le(batch, 0);
    let count = format::u32_le(batch, 8);
    trace!(sequence, count, len = batch.len(), "decoding batch; count not enforced");

    let mut offset = BATCH_HEADER_SIZE;
    while offset < batch.len() {
        match decode_record(batch, offset, out) {
            Ok(next_offset) => offset = next_offset,
            Err(err) => {
                debug!(offset, %err, "batch walk stopped early; keeping decoded records");
                return;
            }
        }
    }
}

/// Decode the record at `offset`, appending it to `out` if it is a put.
///
/// Returns the offset of the next record.
fn decode_record(batch: &[u8], offset: usize, out: &mut Vec<Entry>) -> Result<usize, WalError> {
    let tag = batch[offset];
    let (key, after_key) = decode_slice(batch, offset + 1)?;

    match tag {
        TAG_PUT => {
            let (value, after_value) = decode_slice(batch, after_key)?;
            out.push(Entry {
                key: key.to_vec(),
                value: value.to_vec(),
            });
            Ok(after_value)
        }
        TAG_DELETE => {
            // No value to read; the record is dropped entirely.
            Ok(after_key)
        }
        other => Err(WalError::UnknownTag(other)),
    }
}

/// Decode a varint-length-prefixed byte slice at `offset`.
///
/// Returns the slice and the offset just past it.
fn decode_slice(batch: &[u8], offset: usize) -> Result<(&[u8], usize), WalError> {
    let (len, consumed) = varint::decode_u32(&batch[offset..])?;
    let body_start = offset + consumed;
    // The length field is attacker-controlled; bound in u64 so the check
    // cannot wrap.
    let need = body_start as u64 + u64::from(len);
    if need > batch.len() as u64 {
        return Err(WalError::RecordOverrun {
            need,
            have: batch.len(),
        });
    }
    let body_end = body_start + len as usize;
    Ok((&batch[body_start..body_end], body_end))
}
