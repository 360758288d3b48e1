//! Streaming SHA-256 fingerprints of registered files.
//!
//! Files are hashed through a fixed-size copy buffer, so memory use does not
//! depend on file size. Errors are returned as-is; nothing is retried.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Length of a hex-encoded digest.
pub const HEX_DIGEST_LEN: usize = 64;

/// Hashes everything `reader` yields and returns the lowercase hex digest.
///
/// # Errors
///
/// Returns the first read error.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes the file at `path`.
///
/// # Errors
///
/// Fails if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    sha256_reader(file)
}
