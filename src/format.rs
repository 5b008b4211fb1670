//! Shared format plumbing: little-endian field readers and the checksum
//! policy used by both the table and log decoders.
//!
//! Block trailers and log record headers each carry a masked CRC32C written
//! by the storage engine. Both layouts force the field to be decoded
//! positionally, but this crate accepts the stored value as-is: scans target
//! point-in-time copies of possibly live stores, where a torn tail is
//! expected and already handled by the skip-and-continue policy.

use tracing::trace;

// ------------------------------------------------------------------------------------------------
// Checksum policy
// ------------------------------------------------------------------------------------------------

/// Whether stored CRC fields should be verified after decoding.
///
/// Every decoder routes its stored checksum through [`note_checksum`], so a
/// stricter mode has exactly one landing site. The flag is compile-time
/// honest: switching it on without writing the verifier fails the build.
pub(crate) const VERIFY_CHECKSUMS: bool = false;

/// Single exit point for stored CRC fields.
///
/// The value is traced for diagnostics and accepted. A masked-CRC32C
/// computation over `payload` compared against `stored` belongs here once
/// [`VERIFY_CHECKSUMS`] is enabled.
pub(crate) fn note_checksum(stored: u32, payload: &[u8]) {
    const {
        assert!(
            !VERIFY_CHECKSUMS,
            "VERIFY_CHECKSUMS is set but no verifier is implemented"
        )
    };
    trace!(stored, payload_len = payload.len(), "stored checksum accepted unverified");
}

// ------------------------------------------------------------------------------------------------
// Little-endian field readers
// ------------------------------------------------------------------------------------------------
//
// Callers establish bounds before reading; these helpers only assemble the
// bytes.

pub(crate) fn u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub(crate) fn u64_le(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
