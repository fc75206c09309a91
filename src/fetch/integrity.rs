//! SHA-256 content digests for files on disk.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer for hashing (1 MiB).
const CHUNK_SIZE: usize = 1024 * 1024;

/// Streams `path` through SHA-256 and returns the lower-case hex digest.
pub fn digest_of(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether `path` exists and its digest equals `expected` (hex, any case).
///
/// A missing file is simply not valid; other I/O errors are returned.
pub fn matches(path: &Path, expected: &str) -> io::Result<bool> {
    match digest_of(path) {
        Ok(actual) => Ok(actual.eq_ignore_ascii_case(expected)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
