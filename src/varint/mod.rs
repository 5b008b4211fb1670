//! Variable-length integer decoding for the LevelDB wire format.
//!
//! LevelDB stores unsigned integers as a sequence of 7-bit groups, least
//! significant group first; bit 7 of every byte is a continuation flag:
//!
//! ```text
//! [1xxxxxxx] [1xxxxxxx] … [0xxxxxxx]
//!  └ more     └ more        └ final byte (high bit clear)
//! ```
//!
//! Two decoders are provided, both following the crate-wide
//! `(value, bytes_consumed)` convention:
//!
//! - [`decode_u32`] — the 32-bit form, at most 5 encoded bytes.
//! - [`decode_u64_truncated`] — the 64-bit form, at most 10 encoded bytes,
//!   returning **only the low 32 bits** of the decoded value. Block handles
//!   in the small segment files this crate targets never exceed 32 bits of
//!   offset, so the truncation is a documented scope limitation rather than
//!   a general-purpose 64-bit decoder.
//!
//! # Guarantees
//!
//! - No decoder reads past the first terminating byte.
//! - No panics: malformed input is reported through [`VarintError`].

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Longest legal encoding of a 32-bit varint (5 × 7 = 35 payload bits).
pub(crate) const MAX_VARINT32_LEN: usize = 5;

/// Longest legal encoding of a 64-bit varint (10 × 7 = 70 payload bits).
pub(crate) const MAX_VARINT64_LEN: usize = 10;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors produced while decoding a varint.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum VarintError {
    /// The buffer ended before a byte with the high bit clear was seen.
    #[error("buffer ended inside a varint ({available} bytes available)")]
    Truncated {
        /// Bytes that were available from the decode position.
        available: usize,
    },

    /// The encoding kept its continuation bit set past the maximum length.
    #[error("varint exceeds {max_len} bytes")]
    TooLong {
        /// Maximum encoded length for the requested width.
        max_len: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// Decoders
// ------------------------------------------------------------------------------------------------

/// Decode a 32-bit unsigned varint from the front of `buf`.
///
/// # Returns
/// The decoded value and the number of bytes consumed.
///
/// # Errors
/// - [`VarintError::TooLong`] once the accumulated shift reaches 35, i.e.
///   the encoding needs more than [`MAX_VARINT32_LEN`] bytes.
/// - [`VarintError::Truncated`] if `buf` ends before a terminating byte.
pub(crate) fn decode_u32(buf: &[u8]) -> Result<(u32, usize), VarintError> {
    let mut value: u32 = 0;
    let mut shift: u32 = 0;

    for (idx, &byte) in buf.iter().enumerate() {
        if shift >= 35 {
            return Err(VarintError::TooLong {
                max_len: MAX_VARINT32_LEN,
            });
        }
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, idx + 1));
        }
        shift += 7;
    }

    Err(VarintError::Truncated {
        available: buf.len(),
    })
}

/// Decode a 64-bit unsigned varint from the front of `buf`, keeping only
/// the low 32 bits of the result.
///
/// Groups beyond bit 31 are accumulated and then discarded by the final
/// truncation; widening the return type would change observable offsets on
/// inputs larger than this crate targets, so the narrowing is deliberate.
///
/// # Returns
/// The low 32 bits of the decoded value and the number of bytes consumed.
///
/// # Errors
/// - [`VarintError::TooLong`] once the accumulated shift reaches 70, i.e.
///   the encoding needs more than [`MAX_VARINT64_LEN`] bytes.
/// - [`VarintError::Truncated`] if `buf` ends before a terminating byte.
pub(crate) fn decode_u64_truncated(buf: &[u8]) -> Result<(u32, usize), VarintError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for (idx, &byte) in buf.iter().enumerate() {
        if shift >= 70 {
            return Err(VarintError::TooLong {
                max_len: MAX_VARINT64_LEN,
            });
        }
        // Shifts run 0, 7, …, 63; bits pushed past bit 63 fall away, as do
        // bits 32..64 at the final narrowing below.
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value as u32, idx + 1));
        }
        shift += 7;
    }

    Err(VarintError::Truncated {
        available: buf.len(),
    })
}
