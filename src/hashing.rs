//! Content Hashing - SHA-256 Fingerprints
//!
//! Snapshots are content-addressed: the same page body always yields the
//! same fingerprint, so unchanged pages land on the same storage key.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Fingerprint of raw page text, over its UTF-8 bytes.
pub fn content_hash(content: &str) -> String {
    sha256_hex(content.as_bytes())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
