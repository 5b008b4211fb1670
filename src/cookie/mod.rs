//! Safe Storage cookie decryption and session-token extraction.
//!
//! Chromium-family browsers encrypt cookie values at rest with a key
//! derived from an OS-keychain passphrase ("Safe Storage"). The scheme
//! is fixed by the target format and replicated here exactly:
//!
//! ```text
//! ciphertext = ["v10" | "v11"]? ‖ AES-128-CBC(PKCS7) bytes
//! key        = PBKDF2-HMAC-SHA1(passphrase, "saltysalt", 1003 iters, 16 B)
//! iv         = 16 × 0x20
//! ```
//!
//! After decryption the plaintext is scanned for the `xoxd-` session
//! token marker; the printable-ASCII run starting there is the token
//! candidate, which is percent-decoded before being returned. Absent
//! the marker, the whole plaintext is returned for the caller to
//! validate.
//!
//! Unlike the structural scanning side of this crate, failures here are
//! **hard**: a padding rejection almost always means the wrong
//! passphrase, and reporting it as "no token" would misdiagnose a
//! fixable keychain problem as a missing session.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::sync::OnceLock;

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use percent_encoding::percent_decode;
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, trace};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------
//
// All fixed by the Safe Storage format; none is tunable.

/// PBKDF2 salt.
const SALT: &[u8] = b"saltysalt";

/// PBKDF2 iteration count.
const PBKDF2_ITERATIONS: u32 = 1003;

/// Derived key length in bytes (AES-128).
const KEY_LEN: usize = 16;

/// CBC initialization vector: sixteen ASCII spaces.
const IV: [u8; 16] = [0x20; 16];

/// Version prefixes stripped before decryption; their absence marks the
/// legacy format where the whole buffer is ciphertext.
const VERSION_PREFIXES: [&[u8; 3]; 2] = [b"v10", b"v11"];

/// Marker opening a session token inside decrypted plaintext.
const TOKEN_MARKER: &[u8] = b"xoxd-";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by cookie decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CookieError {
    /// The cipher rejected the ciphertext length or the PKCS7 padding.
    ///
    /// Padding validation doubles as an integrity check: a wrong
    /// passphrase almost always fails here.
    #[error("cookie decryption failed; wrong passphrase or corrupt ciphertext")]
    DecryptionFailed,

    /// Plaintext carried no token marker and is not valid UTF-8, so it
    /// cannot be returned as text.
    #[error("decrypted cookie is not valid UTF-8")]
    FormatInvalid,
}

// ------------------------------------------------------------------------------------------------
// Decryptor
// ------------------------------------------------------------------------------------------------

/// Safe Storage decryptor owning a passphrase and its derived key.
///
/// Key derivation runs 1003 HMAC-SHA1 rounds, so the key is derived on
/// first use and cached for the decryptor's lifetime. The cache is a
/// plain owned field; [`reset`](Self::reset) clears it explicitly, and
/// no process-wide state exists.
pub struct CookieDecryptor {
    /// The keychain-supplied Safe Storage passphrase.
    passphrase: String,

    /// Lazily derived AES key.
    key: OnceLock<[u8; KEY_LEN]>,
}

impl CookieDecryptor {
    /// Create a decryptor for `passphrase`. No derivation happens yet.
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            key: OnceLock::new(),
        }
    }

    /// Drop the cached derived key; the next decryption re-derives it.
    pub fn reset(&mut self) {
        self.key = OnceLock::new();
    }

    /// Decrypt one encrypted cookie value and extract its token.
    ///
    /// - Empty input returns an empty string, not an error: an unset
    ///   cookie is a caller-level condition, not a crypto failure.
    /// - If the plaintext contains [`TOKEN_MARKER`], the printable-ASCII
    ///   run starting there is percent-decoded and returned.
    /// - Otherwise the whole plaintext is returned for the caller to
    ///   validate.
    ///
    /// # Errors
    /// - [`CookieError::DecryptionFailed`] on cipher length or padding
    ///   rejection.
    /// - [`CookieError::FormatInvalid`] if marker-less plaintext is not
    ///   valid UTF-8.
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<String, CookieError> {
        if encrypted.is_empty() {
            return Ok(String::new());
        }

        let ciphertext = strip_version_prefix(encrypted);
        let plaintext = Aes128CbcDec::new(self.key().into(), (&IV).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| {
                debug!(len = ciphertext.len(), "cipher rejected ciphertext");
                CookieError::DecryptionFailed
            })?;

        extract_token(&plaintext)
    }

    /// Derived key, computing it on first use.
    fn key(&self) -> &[u8; KEY_LEN] {
        self.key.get_or_init(|| {
            trace!(iterations = PBKDF2_ITERATIONS, "deriving Safe Storage key");
            let mut key = [0u8; KEY_LEN];
            pbkdf2_hmac::<Sha1>(self.passphrase.as_bytes(), SALT, PBKDF2_ITERATIONS, &mut key);
            key
        })
    }
}

/// One-shot convenience wrapper around [`CookieDecryptor`].
///
/// Callers decrypting more than one cookie should hold a decryptor and
/// reuse its cached key.
pub fn decrypt_cookie_value(encrypted: &[u8], passphrase: &str) -> Result<String, CookieError> {
    CookieDecryptor::new(passphrase).decrypt(encrypted)
}

// ------------------------------------------------------------------------------------------------
// Plaintext handling
// ------------------------------------------------------------------------------------------------

/// Strip a `v10`/`v11` version prefix if present; legacy values carry
/// none and are ciphertext from byte 0.
fn strip_version_prefix(encrypted: &[u8]) -> &[u8] {
    for prefix in VERSION_PREFIXES {
        if encrypted.starts_with(prefix) {
            return &encrypted[prefix.len()..];
        }
    }
    encrypted
}

/// Pull the session token out of decrypted plaintext.
fn extract_token(plaintext: &[u8]) -> Result<String, CookieError> {
    let Some(start) = find_marker(plaintext) else {
        trace!("no token marker; returning whole plaintext");
        return String::from_utf8(plaintext.to_vec()).map_err(|_| CookieError::FormatInvalid);
    };

    // The token is the contiguous printable-ASCII run from the marker.
    let run_len = plaintext[start..]
        .iter()
        .take_while(|&&byte| (0x21..=0x7e).contains(&byte))
        .count();
    let candidate = &plaintext[start..start + run_len];

    // Printable ASCII is valid UTF-8, so the lossy conversions below
    // never actually lose bytes; they exist to avoid unwrapping.
    match percent_decode(candidate).decode_utf8() {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(candidate).into_owned()),
    }
}

/// Index of the first [`TOKEN_MARKER`] occurrence, if any.
fn find_marker(plaintext: &[u8]) -> Option<usize> {
    if plaintext.len() < TOKEN_MARKER.len() {
        return None;
    }
    plaintext
        .windows(TOKEN_MARKER.len())
        .position(|window| window == TOKEN_MARKER)
}
