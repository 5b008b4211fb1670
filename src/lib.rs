//! # ldbscan
//!
//! A read-only extractor for the **LevelDB on-disk format** as used by
//! Chromium's Local Storage, plus a decryptor for the **Safe Storage**
//! cookie encryption used by Chromium-family browsers. Together they
//! recover session secrets from a browser profile's persisted state
//! without running the browser and without linking any native database
//! or crypto library.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ldbscan::{find_by_substring, scan_directory, decrypt_cookie_value};
//!
//! // Every key/value pair recoverable from a Local Storage directory,
//! // across sorted tables (.ldb/.sst) and write-ahead logs (.log).
//! let entries = scan_directory("/path/to/leveldb-copy");
//!
//! // Only entries whose key contains a byte run.
//! let tokens = find_by_substring("/path/to/leveldb-copy", b"xoxc-");
//!
//! // Reverse Safe Storage cookie encryption with the keychain passphrase.
//! let cookie: &[u8] = &entries[0].value;
//! let token = decrypt_cookie_value(cookie, "peanuts").unwrap();
//! ```
//!
//! ## Features
//!
//! - **Sorted-table extraction** — footer, index block, and every data
//!   block, with snappy and shared-prefix decoding replicated from format
//!   knowledge alone.
//! - **Log replay** — 32 KiB physical framing, fragment reassembly, and
//!   write-batch decoding; every put ever logged is returned.
//! - **Corruption tolerance** — structural damage skips a block or file
//!   and keeps partial results, matching the scrape-a-copied-profile use
//!   case; scanning never fails its caller.
//! - **Cookie decryption** — PBKDF2-HMAC-SHA1 key derivation and
//!   AES-128-CBC with the fixed Safe Storage parameters, plus `xoxd-`
//!   session-token extraction from the plaintext.
//!
//! The crate never writes to the files it reads. It assumes the caller
//! scans a private point-in-time copy of the source directory; a torn
//! read of a live store degrades to a parse failure, never a crash.

pub(crate) mod cookie;
pub(crate) mod format;
pub(crate) mod scan;
pub(crate) mod sstable;
pub(crate) mod varint;
pub(crate) mod wal;

#[cfg(test)]
pub(crate) mod testutil;

use std::fmt;

pub use cookie::{CookieDecryptor, CookieError, decrypt_cookie_value};
pub use scan::{find_by_substring, scan_directory};

// ------------------------------------------------------------------------------------------------
// Entry
// ------------------------------------------------------------------------------------------------

/// One key-value pair recovered from a table or log file.
///
/// Keys and values are raw bytes: Local Storage keys carry a one-byte
/// type prefix and values are often UTF-16, so no text interpretation is
/// imposed here. Entries are immutable once produced and owned by the
/// vector they were appended to.
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    /// Raw key bytes, fully reconstructed from shared-prefix deltas.
    pub key: Vec<u8>,

    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl fmt::Debug for Entry {
    /// Renders keys and values lossily as text so logs and test failures
    /// stay readable; the underlying bytes are untouched.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value", &String::from_utf8_lossy(&self.value))
            .finish()
    }
}
