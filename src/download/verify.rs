use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::error::FetchError;

const READ_BUFFER: usize = 64 * 1024;

/// SHA-256 of a file as lowercase hex, read in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> Result<String, FetchError> {
    let mut file = File::open(path).map_err(|e| FetchError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];

    loop {
        let read = file.read(&mut buffer).map_err(|e| FetchError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file's digest against `expected` (case-insensitive).
///
/// On mismatch the file is deleted before the error is returned, so a bad
/// artifact never survives verification.
pub fn verify(path: &Path, expected: &str) -> Result<String, FetchError> {
    let actual = sha256_file(path)?;
    let expected = expected.trim();

    if !actual.eq_ignore_ascii_case(expected) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("could not delete corrupted download {}: {e}", path.display());
        }
        return Err(FetchError::IntegrityMismatch {
            path: path.to_path_buf(),
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }

    tracing::debug!("sha256 ok for {}: {actual}", path.display());
    Ok(actual)
}
