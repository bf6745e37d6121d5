// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content hashing — SHA-256 fingerprints recorded at insert and checked when
// a stored file is verified.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use folio_core::error::{FolioError, Result};
use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of a file's contents, streamed rather than read whole.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Check the file at `path` against `expected_hex`.
///
/// Fails with [`FolioError::IntegrityMismatch`] carrying both digests when
/// the contents have changed.
pub fn verify_file(path: impl AsRef<Path>, expected_hex: &str) -> Result<()> {
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(FolioError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
