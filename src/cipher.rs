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

//! Repeating-key XOR obfuscation of backup artifacts.
//!
//! This is **not** encryption in any meaningful sense: the keystream is the
//! same 32 bytes over and over, so anyone holding a little known plaintext
//! (and every zip starts with known bytes) recovers the key. It only keeps
//! casual readers from opening a downloaded backup. Don't treat
//! `encrypted = true` as a security boundary.
//!
//! Format: the 13 byte [MAGIC] header, then each input byte at offset `n`
//! (counted from the first byte after the header) XORed with `key[n % 32]`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::io_error;
use crate::{Error, Result, Stage, CHUNK_SIZE, TMP_PREFIX};

/// Header at the start of every encrypted artifact.
pub const MAGIC: &[u8; 13] = b"OASIS_ENC_V1\0";

pub const KEY_LEN: usize = 32;

/// Keystream seed derived from the application secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Derive the key: the SHA-256 of the secret's bytes.
pub fn derive_key(secret: &[u8]) -> Key {
    Key(Sha256::digest(secret).into())
}

/// XORs a running keystream into buffers, continuing the position across calls.
struct Keystream<'k> {
    key: &'k Key,
    offset: usize,
}

impl<'k> Keystream<'k> {
    fn new(key: &'k Key) -> Keystream<'k> {
        Keystream { key, offset: 0 }
    }

    fn apply(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b ^= self.key.0[self.offset];
            self.offset = (self.offset + 1) % KEY_LEN;
        }
    }
}

fn xor_stream<R: Read, W: Write>(key: &Key, mut input: R, mut output: W) -> io::Result<u64> {
    let mut keystream = Keystream::new(key);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let len = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        keystream.apply(&mut buf[..len]);
        output.write_all(&buf[..len])?;
        total += len as u64;
    }
    output.flush()?;
    Ok(total)
}

/// Write the header and the obfuscated input to `output`.
///
/// Returns the number of payload bytes, not counting the header.
pub fn encrypt<R: Read, W: Write>(key: &Key, input: R, mut output: W) -> io::Result<u64> {
    output.write_all(MAGIC)?;
    xor_stream(key, input, output)
}

/// Check and consume the header from `input`.
///
/// Returns a description of the problem if the header is wrong or short.
pub fn read_header<R: Read>(input: &mut R) -> io::Result<std::result::Result<(), String>> {
    let mut header = [0u8; MAGIC.len()];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]) {
            Ok(0) => {
                return Ok(Err(format!(
                    "file is {filled} bytes long, shorter than the {} byte header",
                    MAGIC.len()
                )))
            }
            Ok(len) => filled += len,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    if &header == MAGIC {
        Ok(Ok(()))
    } else {
        Ok(Err("header does not match".to_owned()))
    }
}

/// Decode a stream written by [encrypt], after its header has been checked
/// with [read_header].
pub fn decrypt_payload<R: Read, W: Write>(key: &Key, input: R, output: W) -> io::Result<u64> {
    xor_stream(key, input, output)
}

/// A temporary file next to `output`, to be renamed over it once complete.
fn output_temp(output: &Path, stage: Stage) -> Result<NamedTempFile> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(TMP_PREFIX)
        .tempfile_in(dir)
        .map_err(io_error(stage, dir))
}

fn commit(temp: NamedTempFile, output: &Path, stage: Stage) -> Result<()> {
    temp.persist(output)
        .map(|_| ())
        .map_err(|err| io_error(stage, output)(err.error))
}

/// Encrypt the file at `input` into `output`.
///
/// `output` only appears once it's completely written.
pub fn encrypt_file(key: &Key, input: &Path, output: &Path) -> Result<u64> {
    let source = File::open(input).map_err(io_error(Stage::Encrypt, input))?;
    let temp = output_temp(output, Stage::Encrypt)?;
    let len = encrypt(key, BufReader::new(source), BufWriter::new(temp.as_file()))
        .map_err(io_error(Stage::Encrypt, temp.path()))?;
    commit(temp, output, Stage::Encrypt)?;
    debug!(?input, ?output, len, "Encrypted file");
    Ok(len)
}

/// Decrypt the file at `input` into `output`.
///
/// Fails with [Error::NotEncryptedBackup] if `input` doesn't start with the
/// header. `output` is only created once it's completely written, so it's
/// never left behind by a failure.
pub fn decrypt_file(key: &Key, input: &Path, output: &Path) -> Result<u64> {
    let mut source = File::open(input).map_err(io_error(Stage::Decrypt, input))?;
    read_header(&mut source)
        .map_err(io_error(Stage::Decrypt, input))?
        .map_err(|details| Error::NotEncryptedBackup {
            path: input.to_owned(),
            details,
        })?;
    let temp = output_temp(output, Stage::Decrypt)?;
    let len = decrypt_payload(key, BufReader::new(source), BufWriter::new(temp.as_file()))
        .map_err(io_error(Stage::Decrypt, temp.path()))?;
    commit(temp, output, Stage::Decrypt)?;
    debug!(?input, ?output, len, "Decrypted file");
    Ok(len)
}

/// True if the file starts with the encryption header.
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(io_error(Stage::Decrypt, path))?;
    Ok(read_header(&mut file)
        .map_err(io_error(Stage::Decrypt, path))?
        .is_ok())
}
