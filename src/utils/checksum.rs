//! SHA-256 helpers.
//!
//! Checksums are stored and displayed as `sha256:<hex>`; catalog entries may
//! give either the prefixed or the bare hex form.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

const PREFIX: &str = "sha256:";

/// Hex encoded SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `sha256:<hex>` checksum of `bytes`, the form recorded in the state file.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    format!("{PREFIX}{}", sha256_hex(bytes))
}

/// `sha256:<hex>` checksum of a file on disk.
pub fn file_checksum(path: &Path) -> Result<String> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;
    Ok(checksum(&content))
}

/// Strips an optional `sha256:` prefix and lowercases the hex digest.
#[must_use]
pub fn normalize(expected: &str) -> String {
    let trimmed = expected.trim();
    trimmed.strip_prefix(PREFIX).unwrap_or(trimmed).to_ascii_lowercase()
}

/// Compares `bytes` against an expected digest.
///
/// Returns the actual hex digest as the error value on mismatch.
pub fn verify(bytes: &[u8], expected: &str) -> std::result::Result<(), String> {
    let actual = sha256_hex(bytes);
    if actual == normalize(expected) {
        Ok(())
    } else {
        Err(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(sha256_hex(b"hello"), HELLO);
        assert_eq!(checksum(b"hello"), format!("sha256:{HELLO}"));
    }

    #[test]
    fn test_verify_accepts_prefixed_and_uppercase() {
        assert!(verify(b"hello", HELLO).is_ok());
        assert!(verify(b"hello", &format!("sha256:{}", HELLO.to_uppercase())).is_ok());
        assert_eq!(verify(b"hello", "deadbeef"), Err(HELLO.to_string()));
    }
}
