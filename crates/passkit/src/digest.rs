//! Content digests for manifest entries.
//!
//! Wallet manifests record a SHA-1 digest, hex encoded, for every bundle
//! member. The builder and the verifier both go through this module, so the
//! algorithm and encoding cannot drift between the two sides.

use crate::Result;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

/// Compute the lowercase hex SHA-1 digest of a byte slice.
///
/// Deterministic and pure: identical input always yields an identical
/// digest string.
#[must_use]
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Compute the digest of a file's contents.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read.
pub fn digest_file(path: impl AsRef<Path>) -> Result<String> {
    let data = fs::read(path)?;
    Ok(digest(&data))
}
