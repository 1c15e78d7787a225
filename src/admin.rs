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

//! Operations an administrator asks for: create, download, delete, verify
//! and restore backups.
//!
//! Failures are logged with the record, the acting user and the failing
//! stage before they're returned.

use std::collections::BTreeMap;
use std::fs::{self, File};

use sha2::{Digest, Sha256};
use tracing::{error, info, instrument, warn};

use crate::cleanup::delete_record;
use crate::errors::io_error;
use crate::integrity::constant_time_eq;
use crate::*;

/// The administrator making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
}

impl Actor {
    pub fn new(username: &str) -> Actor {
        Actor {
            username: username.to_owned(),
        }
    }
}

/// An artifact opened for download.
#[derive(Debug)]
pub struct Download {
    pub filename: String,
    pub size_bytes: u64,
    pub file: File,
}

/// Result of checking an artifact against its recorded hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// Start of the recorded hash, to show alongside the answer.
    pub hash_prefix: String,
}

/// Checks an administrator's password.
pub trait Authenticator {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Proof that an administrator just confirmed their password.
///
/// Restores require one, and [Reauthenticated::confirm] is the only way to get one.
#[derive(Debug)]
pub struct Reauthenticated {
    username: String,
}

impl Reauthenticated {
    pub fn confirm(
        authenticator: &dyn Authenticator,
        username: &str,
        password: &str,
    ) -> Result<Reauthenticated> {
        if authenticator.authenticate(username, password) {
            Ok(Reauthenticated {
                username: username.to_owned(),
            })
        } else {
            warn!(username, "Re-authentication failed");
            Err(Error::ReauthenticationFailed {
                username: username.to_owned(),
            })
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Administrators listed in the configuration, with SHA-256 password digests.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAdmins {
    digests: BTreeMap<String, String>,
}

impl ConfiguredAdmins {
    pub fn new(digests: BTreeMap<String, String>) -> ConfiguredAdmins {
        ConfiguredAdmins { digests }
    }

    pub fn from_config(config: &Config) -> ConfiguredAdmins {
        ConfiguredAdmins::new(config.admins.clone())
    }
}

impl Authenticator for ConfiguredAdmins {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        let Some(expected) = self.digests.get(username) else {
            return false;
        };
        let actual = hex::encode(Sha256::digest(password.as_bytes()));
        constant_time_eq(actual.as_bytes(), expected.to_ascii_lowercase().as_bytes())
    }
}

/// Log a failed operation with its context, and pass the result through.
fn logged<T>(result: Result<T>, operation: &str, id: Option<u64>, username: &str) -> Result<T> {
    if let Err(err) = &result {
        error!(
            operation,
            record = id,
            user = username,
            stage = ?err.stage(),
            kind = %err.kind(),
            "{err}"
        );
    }
    result
}

/// Make a backup and store a record of it.
///
/// If the record can't be stored, the artifact is deleted, so there's never
/// an artifact without a record from this path.
#[instrument(skip(guardian, store, actor, notes), fields(user = %actor.username))]
pub fn create_backup(
    guardian: &Guardian,
    store: &dyn RecordStore,
    content: BackupContent,
    encrypt: bool,
    origin: BackupOrigin,
    actor: &Actor,
    notes: Option<String>,
) -> Result<BackupRecord> {
    let result = (|| -> Result<BackupRecord> {
        let artifact = match content {
            BackupContent::Full => guardian.create_full_backup(encrypt)?,
            BackupContent::Database => guardian.create_db_only_backup(encrypt)?,
            BackupContent::Media => guardian.create_media_backup(encrypt)?,
        };
        let notes =
            notes.unwrap_or_else(|| format!("Backup {content} created by {}", actor.username));
        let new_record = NewBackupRecord::from_artifact(
            &artifact,
            origin,
            Some(actor.username.clone()),
            notes,
        );
        match store.insert(new_record) {
            Ok(record) => {
                info!(id = record.id, filename = record.filename, "Backup recorded");
                Ok(record)
            }
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&artifact.path) {
                    warn!(path = ?artifact.path, ?remove_err, "Failed to remove unrecorded artifact");
                }
                Err(err)
            }
        }
    })();
    logged(result, "create", None, &actor.username)
}

/// Open a backup artifact for reading.
#[instrument(skip(store, actor), fields(user = %actor.username))]
pub fn download_backup(store: &dyn RecordStore, id: u64, actor: &Actor) -> Result<Download> {
    let result = (|| -> Result<Download> {
        let record = store.require(id)?;
        let file = File::open(&record.filepath).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: record.filepath.clone(),
                }
            } else {
                io_error(Stage::Download, &record.filepath)(err)
            }
        })?;
        let size_bytes = file
            .metadata()
            .map_err(io_error(Stage::Download, &record.filepath))?
            .len();
        Ok(Download {
            filename: record.filename,
            size_bytes,
            file,
        })
    })();
    logged(result, "download", Some(id), &actor.username)
}

/// Delete a backup's artifact and then its record.
///
/// Returns false if the artifact was already missing; the record is removed
/// either way.
#[instrument(skip(store, actor), fields(user = %actor.username))]
pub fn delete_backup(store: &dyn RecordStore, id: u64, actor: &Actor) -> Result<bool> {
    let result = store
        .require(id)
        .and_then(|record| delete_record(store, &record));
    if let Ok(deleted) = &result {
        info!(id, deleted, "Backup deleted");
    }
    logged(result, "delete", Some(id), &actor.username)
}

/// Check a backup artifact against its recorded hash.
#[instrument(skip(store, actor), fields(user = %actor.username))]
pub fn verify_backup(store: &dyn RecordStore, id: u64, actor: &Actor) -> Result<Verification> {
    let result = (|| -> Result<Verification> {
        let record = store.require(id)?;
        if !record.filepath.is_file() {
            return Err(Error::NotFound {
                path: record.filepath.clone(),
            });
        }
        let expected = record
            .recorded_hash()
            .ok_or(Error::NoRecordedHash { id: record.id })?;
        let valid = integrity::verify(&record.filepath, expected)?;
        if valid {
            info!(id, "Backup verified");
        } else {
            warn!(id, path = ?record.filepath, "Backup does not match its recorded hash");
        }
        Ok(Verification {
            valid,
            hash_prefix: record.hash_prefix().to_owned(),
        })
    })();
    logged(result, "verify", Some(id), &actor.username)
}

/// Restore the database from a backup, for an administrator who just
/// confirmed their password.
#[instrument(skip(guardian, store, proof), fields(user = proof.username()))]
pub fn restore_backup(
    guardian: &Guardian,
    store: &dyn RecordStore,
    id: u64,
    proof: &Reauthenticated,
) -> Result<RestoreOutcome> {
    let result = store
        .require(id)
        .and_then(|record| guardian.restore_database(&record));
    if let Ok(outcome) = &result {
        info!(id, filename = outcome.filename, "Restore completed");
    }
    logged(result, "restore", Some(id), proof.username())
}
