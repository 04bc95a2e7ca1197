//! Content fingerprints binding a signature to the visible document text
//! Author: kartik4091
//!
//! A fingerprint is `sha256:<hex>` over the text a reader sees, with every
//! whitespace character and every placeholder occurrence removed. Re-saving a
//! document keeps its fingerprint; editing a word does not.

use sha2::{Digest, Sha256};

pub const DIGEST_PREFIX: &str = "sha256:";

/// Lowercase hex SHA-256
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of opaque content: the raw bytes are hashed as they are
pub fn bytes_fingerprint(bytes: &[u8]) -> String {
    format!("{}{}", DIGEST_PREFIX, sha256_hex(bytes))
}

/// Fingerprint of decoded text. NUL padding that some PDF encoders emit
/// counts as whitespace.
pub fn text_fingerprint(text: &str, marker: &str) -> String {
    let compact: String = text.chars().filter(|c| !ignorable(*c)).collect();
    let marker: String = marker.chars().filter(|c| !ignorable(*c)).collect();
    let compact = if marker.is_empty() {
        compact
    } else {
        compact.replace(&marker, "")
    };
    bytes_fingerprint(compact.as_bytes())
}

fn ignorable(c: char) -> bool {
    c.is_whitespace() || c == '\0'
}
