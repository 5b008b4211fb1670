//! Shared fixture builders for unit tests.
//!
//! The crate ships no write path, so everything required to fabricate
//! tables, blocks, batches, and log files on the wire format lives here,
//! in test support only. Stored checksum fields are zeroed throughout:
//! the decoders read them positionally and never verify them.

use std::fs;
use std::path::{Path, PathBuf};

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use tracing_subscriber::EnvFilter;

use crate::Entry;
use crate::sstable::TABLE_MAGIC;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shorthand for an owned [`Entry`].
pub(crate) fn entry(key: &[u8], value: &[u8]) -> Entry {
    Entry {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

/// Write a fixture file into `dir` and return its path.
pub(crate) fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

// ------------------------------------------------------------------------------------------------
// Varint / block encoding
// ------------------------------------------------------------------------------------------------

/// Append the varint encoding of `value`.
pub(crate) fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Length of the longest common prefix of `a` and `b`.
pub(crate) fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Delta-encode `entries` into one uncompressed block image with a single
/// restart point at offset 0.
pub(crate) fn build_block(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut block = Vec::new();
    let mut prev_key: &[u8] = b"";
    for (key, value) in entries {
        let shared = shared_prefix_len(prev_key, key);
        push_varint(&mut block, shared as u64);
        push_varint(&mut block, (key.len() - shared) as u64);
        push_varint(&mut block, value.len() as u64);
        block.extend_from_slice(&key[shared..]);
        block.extend_from_slice(value);
        prev_key = key;
    }
    block.extend_from_slice(&0u32.to_le_bytes()); // restart offset 0
    block.extend_from_slice(&1u32.to_le_bytes()); // restart count
    block
}

// ------------------------------------------------------------------------------------------------
// Table file assembly
// ------------------------------------------------------------------------------------------------

/// Append `payload ‖ tag ‖ zeroed checksum` to a file image, returning the
/// handle coordinates `(offset, payload_len)`.
pub(crate) fn append_block(file: &mut Vec<u8>, payload: &[u8], tag: u8) -> (usize, usize) {
    let offset = file.len();
    file.extend_from_slice(payload);
    file.push(tag);
    file.extend_from_slice(&[0u8; 4]);
    (offset, payload.len())
}

/// Encode an `(offset, size)` pair as a varint64 block handle.
pub(crate) fn encode_handle(offset: usize, size: usize) -> Vec<u8> {
    let mut handle = Vec::new();
    push_varint(&mut handle, offset as u64);
    push_varint(&mut handle, size as u64);
    handle
}

/// Assemble the fixed 48-byte footer for the given handles.
pub(crate) fn footer_bytes(metaindex: (usize, usize), index: (usize, usize)) -> Vec<u8> {
    let mut footer = Vec::with_capacity(48);
    push_varint(&mut footer, metaindex.0 as u64);
    push_varint(&mut footer, metaindex.1 as u64);
    push_varint(&mut footer, index.0 as u64);
    push_varint(&mut footer, index.1 as u64);
    assert!(footer.len() <= 40, "handles overflow footer padding");
    footer.resize(40, 0);
    footer.extend_from_slice(&TABLE_MAGIC);
    footer
}

/// Phase-structured builder for complete table files: data blocks, then an
/// empty metaindex block, an index block, and the footer.
pub(crate) struct TableBuilder {
    file: Vec<u8>,
    index: Vec<(Vec<u8>, Vec<u8>)>,
    compress: bool,
}

impl TableBuilder {
    pub(crate) fn new() -> Self {
        Self {
            file: Vec::new(),
            index: Vec::new(),
            compress: false,
        }
    }

    /// Builder whose data blocks are stored as snappy frames.
    pub(crate) fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::new()
        }
    }

    /// Append one data block holding `entries`, indexed under its last key.
    pub(crate) fn add_block(&mut self, entries: &[(&[u8], &[u8])]) -> &mut Self {
        let payload = build_block(entries);
        let handle = if self.compress {
            let frame = snap::raw::Encoder::new()
                .compress_vec(&payload)
                .expect("snappy compress");
            append_block(&mut self.file, &frame, 1)
        } else {
            append_block(&mut self.file, &payload, 0)
        };
        let separator = entries.last().map(|(key, _)| key.to_vec()).unwrap_or_default();
        self.index.push((separator, encode_handle(handle.0, handle.1)));
        self
    }

    /// Append a pre-encoded index row (for fixtures with bogus handles).
    pub(crate) fn add_index_row(&mut self, key: &[u8], handle_bytes: &[u8]) -> &mut Self {
        self.index.push((key.to_vec(), handle_bytes.to_vec()));
        self
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let metaindex = append_block(&mut self.file, &build_block(&[]), 0);

        let rows: Vec<(&[u8], &[u8])> = self
            .index
            .iter()
            .map(|(key, handle)| (key.as_slice(), handle.as_slice()))
            .collect();
        let index = append_block(&mut self.file, &build_block(&rows), 0);

        self.file.extend_from_slice(&footer_bytes(metaindex, index));
        self.file
    }
}

/// One single-block table holding `entries` — the common case.
pub(crate) fn build_table(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut builder = TableBuilder::new();
    builder.add_block(entries);
    builder.finish()
}

// ------------------------------------------------------------------------------------------------
// Log / write-batch assembly
// ------------------------------------------------------------------------------------------------

/// One framed log record: zeroed checksum ‖ length (u16 LE) ‖ type ‖ payload.
pub(crate) fn log_record(record_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(7 + payload.len());
    record.extend_from_slice(&[0u8; 4]);
    record.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    record.push(record_type);
    record.extend_from_slice(payload);
    record
}

/// Start a write batch: sequence (u64 LE) ‖ count (u32 LE).
pub(crate) fn batch_header(sequence: u64, count: u32) -> Vec<u8> {
    let mut batch = Vec::with_capacity(12);
    batch.extend_from_slice(&sequence.to_le_bytes());
    batch.extend_from_slice(&count.to_le_bytes());
    batch
}

/// Append a put record to a batch.
pub(crate) fn push_put(batch: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    batch.push(1);
    push_varint(batch, key.len() as u64);
    batch.extend_from_slice(key);
    push_varint(batch, value.len() as u64);
    batch.extend_from_slice(value);
}

/// Append a delete record to a batch.
pub(crate) fn push_delete(batch: &mut Vec<u8>, key: &[u8]) {
    batch.push(0);
    push_varint(batch, key.len() as u64);
    batch.extend_from_slice(key);
}

/// A batch of puts with an accurate header.
pub(crate) fn build_batch(puts: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut batch = batch_header(1, puts.len() as u32);
    for (key, value) in puts {
        push_put(&mut batch, key, value);
    }
    batch
}

// ------------------------------------------------------------------------------------------------
// Cookie ciphertext assembly
// ------------------------------------------------------------------------------------------------

/// Encrypt `plaintext` exactly the way Safe Storage does, prefixed with
/// `version` (pass `b""` for the legacy unprefixed form).
pub(crate) fn encrypt_cookie(plaintext: &[u8], passphrase: &str, version: &[u8]) -> Vec<u8> {
    let mut key = [0u8; 16];
    pbkdf2_hmac::<Sha1>(passphrase.as_bytes(), b"saltysalt", 1003, &mut key);

    let ciphertext = Aes128CbcEnc::new((&key).into(), (&[0x20u8; 16]).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = version.to_vec();
    out.extend_from_slice(&ciphertext);
    out
}
