// OASIS Data Guardian.
// Copyright 2026 OASIS contributors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! SHA-256 digests of backup artifacts.
//!
//! The recorded hash is always over the bytes as stored, so for encrypted
//! backups it's over the ciphertext.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::errors::io_error;
use crate::{Result, Stage, CHUNK_SIZE};

/// Hex SHA-256 of everything readable from `reader`, read in [CHUNK_SIZE] pieces.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let len = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..len]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file, without reading it all into memory.
pub fn digest(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(io_error(Stage::Hash, path))?;
    let hex = digest_reader(file).map_err(io_error(Stage::Hash, path))?;
    trace!(?path, %hex, "Hashed file");
    Ok(hex)
}

/// True if the file's digest is `expected_hex`.
///
/// A mismatch is `Ok(false)`; only an unreadable file is an error.
pub fn verify(path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = digest(path)?;
    Ok(constant_time_eq(actual.as_bytes(), expected_hex.as_bytes()))
}

/// Compare two byte strings in time that depends only on their lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
