//! Directory orchestration: per-extension dispatch and the substring query.
//!
//! A Local Storage directory mixes sorted tables (`.ldb`, historically
//! `.sst`) with write-ahead logs (`.log`), plus bookkeeping files
//! (`MANIFEST-*`, `CURRENT`, `LOCK`, `LOG`) this crate has no use for.
//! Scanning dispatches each recognized file to its reader and
//! concatenates the results in directory-listing order; nothing is
//! sorted, merged, or deduplicated.
//!
//! # Guarantees
//!
//! - [`scan_directory`] never fails: a missing or unreadable directory
//!   yields zero entries, and per-file failures are absorbed by the
//!   readers' own skip-and-continue policy.
//! - [`find_by_substring`] returns exactly the scan subset whose key
//!   contains the pattern as a contiguous byte run, case-sensitively.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs;
use std::path::Path;

use tracing::{debug, info, trace};

use crate::Entry;
use crate::{sstable, wal};

// ------------------------------------------------------------------------------------------------
// Public surface
// ------------------------------------------------------------------------------------------------

/// Extract every decodable entry from all table and log files in `dir`.
///
/// Files ending `.ldb` or `.sst` are read as sorted tables, files ending
/// `.log` as write-ahead logs; everything else is ignored. Results are
/// concatenated in directory-listing order.
///
/// A non-existent or unreadable directory yields an empty `Vec`.
pub fn scan_directory(dir: impl AsRef<Path>) -> Vec<Entry> {
    let dir = dir.as_ref();
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(err) => {
            debug!(dir = %dir.display(), %err, "directory unreadable; yielding no entries");
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    let mut files = 0usize;
    for dirent in listing {
        let path = match dirent {
            Ok(dirent) => dirent.path(),
            Err(err) => {
                debug!(dir = %dir.display(), %err, "unreadable directory entry; skipping");
                continue;
            }
        };
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        match ext {
            "ldb" | "sst" => {
                trace!(path = %path.display(), "reading sorted table");
                entries.extend(sstable::entries_from_file(&path));
                files += 1;
            }
            "log" => {
                trace!(path = %path.display(), "reading write-ahead log");
                entries.extend(wal::entries_from_file(&path));
                files += 1;
            }
            _ => {}
        }
    }

    info!(
        dir = %dir.display(),
        files,
        entries = entries.len(),
        "directory scan complete"
    );
    entries
}

/// Extract the [`scan_directory`] subset whose key contains `pattern` as
/// a contiguous byte run.
///
/// Matching is byte-wise and case-sensitive; keys are not interpreted as
/// text. The empty pattern matches every entry.
pub fn find_by_substring(dir: impl AsRef<Path>, pattern: &[u8]) -> Vec<Entry> {
    let mut entries = scan_directory(dir);
    entries.retain(|entry| contains_run(&entry.key, pattern));
    entries
}

/// Whether `needle` occurs in `haystack` as a contiguous byte run.
///
/// The empty needle is a run of every haystack. `windows(0)` panics, so
/// that case must short-circuit first.
fn contains_run(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
