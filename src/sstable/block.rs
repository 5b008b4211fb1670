//! Physical block decoding: decompression and shared-prefix entry parsing.
//!
//! A block arrives here with its 5-byte trailer already split off. What
//! remains is the (possibly compressed) entry region followed by the
//! restart array:
//!
//! ```text
//! [entry]… [restartOffset × u32 LE]… [numRestarts (u32 LE)]
//!
//! entry = varint(shared) ‖ varint(nonShared) ‖ varint(valueLen)
//!         ‖ keySuffix[nonShared] ‖ value[valueLen]
//! ```
//!
//! Keys are delta-coded: each entry names how many leading bytes it shares
//! with the previous key and supplies only the suffix. Restart offsets
//! would allow re-baselining for seeks; extraction walks linearly, so the
//! count is read only to locate where the entry region ends.

use snap::raw::Decoder;
use thiserror::Error;
use tracing::debug;

use super::TableError;
use crate::Entry;
use crate::format;
use crate::varint::{self, VarintError};

// ------------------------------------------------------------------------------------------------
// Compression tags
// ------------------------------------------------------------------------------------------------

/// Block compression schemes, as stored in the one-byte trailer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum CompressionType {
    /// Payload is stored verbatim.
    None = 0,

    /// Payload is one raw snappy frame (leading uncompressed-length varint
    /// included in the frame itself).
    Snappy = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = TableError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Snappy),
            other => Err(TableError::UnsupportedCompression(other)),
        }
    }
}

/// Decompress a block payload according to its trailer tag.
///
/// # Errors
/// - [`TableError::UnsupportedCompression`] for tags outside the closed set.
/// - [`TableError::Snappy`] when the frame is malformed or its declared
///   uncompressed length cannot be produced.
pub(crate) fn decompress(tag: u8, payload: &[u8]) -> Result<Vec<u8>, TableError> {
    match CompressionType::try_from(tag)? {
        CompressionType::None => Ok(payload.to_vec()),
        CompressionType::Snappy => Ok(Decoder::new().decompress_vec(payload)?),
    }
}

// ------------------------------------------------------------------------------------------------
// Entry walk
// ------------------------------------------------------------------------------------------------

/// Why an entry walk ended before reaching the restart array.
#[derive(Debug, Error)]
enum WalkStop {
    /// A length-prefix varint was truncated or over-long.
    #[error("entry prefix: {0}")]
    Varint(#[from] VarintError),

    /// The shared-prefix length exceeds the previous key.
    #[error("shared prefix {shared} exceeds previous key length {prev_len}")]
    SharedOverrun { shared: u32, prev_len: usize },

    /// The entry body would cross into the restart array.
    #[error("entry needs bytes up to {need}, entry region ends at {have}")]
    SpanOverrun { need: u64, have: usize },
}

/// Decode one decompressed block into its entries, in storage order.
///
/// Never fails: corruption stops the walk and whatever decoded up to that
/// point is returned. An undersized block or an implausible restart count
/// yields no entries.
pub(crate) fn parse_block(block: &[u8]) -> Vec<Entry> {
    let mut entries = Vec::new();

    if block.len() < 4 {
        return entries;
    }
    let num_restarts = format::u32_le(block, block.len() - 4) as usize;
    let restarts_start = num_restarts
        .checked_mul(4)
        .and_then(|restart_bytes| (block.len() - 4).checked_sub(restart_bytes));
    let Some(restarts_start) = restarts_start else {
        debug!(
            num_restarts,
            block_len = block.len(),
            "restart array larger than block; no entries"
        );
        return entries;
    };

    let data = &block[..restarts_start];
    let mut prev_key: Vec<u8> = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        match decode_entry(data, offset, &prev_key) {
            Ok((entry, next_offset)) => {
                prev_key.clear();
                prev_key.extend_from_slice(&entry.key);
                entries.push(entry);
                offset = next_offset;
            }
            Err(stop) => {
                debug!(
                    offset,
                    decoded = entries.len(),
                    %stop,
                    "block walk stopped early; keeping decoded entries"
                );
                break;
            }
        }
    }

    entries
}

/// Decode the entry at `offset`, reconstructing its key against `prev_key`.
///
/// Returns the entry and the offset of the next one.
fn decode_entry(data: &[u8], offset: usize, prev_key: &[u8]) -> Result<(Entry, usize), WalkStop> {
    let (shared, n1) = varint::decode_u32(&data[offset..])?;
    let (non_shared, n2) = varint::decode_u32(&data[offset + n1..])?;
    let (value_len, n3) = varint::decode_u32(&data[offset + n1 + n2..])?;

    let body_start = offset + n1 + n2 + n3;
    // Length fields are attacker-controlled; bound arithmetic in u64 so it
    // cannot wrap before the comparison.
    let need = body_start as u64 + u64::from(non_shared) + u64::from(value_len);
    if need > data.len() as u64 {
        return Err(WalkStop::SpanOverrun {
            need,
            have: data.len(),
        });
    }
    if shared as usize > prev_key.len() {
        return Err(WalkStop::SharedOverrun {
            shared,
            prev_len: prev_key.len(),
        });
    }

    let key_end = body_start + non_shared as usize;
    let value_end = key_end + value_len as usize;

    let mut key = Vec::with_capacity(shared as usize + non_shared as usize);
    key.extend_from_slice(&prev_key[..shared as usize]);
    key.extend_from_slice(&data[body_start..key_end]);
    let value = data[key_end..value_end].to_vec();

    Ok((Entry { key, value }, value_end))
}
