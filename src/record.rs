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

//! Records describing each backup artifact, and where they are kept.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::errors::io_error;
use crate::misc::{format_bytes, now_local};
use crate::*;

/// Who asked for a backup.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackupOrigin {
    Manual,
    Automatic,
}

/// What a backup artifact holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackupContent {
    Database,
    Media,
    Full,
}

/// A stored description of one backup artifact.
///
/// Records are never changed after they are stored; they are only removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: u64,
    pub filename: String,
    /// May name a file that's since been removed by something else.
    pub filepath: PathBuf,
    pub size_bytes: u64,
    pub kind: BackupOrigin,
    pub content: BackupContent,
    /// Hex SHA-256 of the stored artifact, or empty if none was recorded.
    #[serde(default)]
    pub hash_sha256: String,
    pub encrypted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Username of the administrator who made it, if known.
    pub created_by: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl BackupRecord {
    pub fn size_display(&self) -> String {
        format_bytes(self.size_bytes)
    }

    /// The recorded hash, unless none was recorded.
    pub fn recorded_hash(&self) -> Option<&str> {
        Some(self.hash_sha256.as_str()).filter(|h| !h.is_empty())
    }

    /// The first 16 hex characters of the recorded hash.
    pub fn hash_prefix(&self) -> &str {
        let hash = self.hash_sha256.as_str();
        hash.get(..16).unwrap_or(hash)
    }
}

/// A record that hasn't been stored yet, so has no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBackupRecord {
    pub filename: String,
    pub filepath: PathBuf,
    pub size_bytes: u64,
    pub kind: BackupOrigin,
    pub content: BackupContent,
    pub hash_sha256: String,
    pub encrypted: bool,
    pub created_at: OffsetDateTime,
    pub created_by: Option<String>,
    pub notes: String,
}

impl NewBackupRecord {
    /// Describe an artifact that was just written.
    pub fn from_artifact(
        artifact: &Artifact,
        kind: BackupOrigin,
        created_by: Option<String>,
        notes: String,
    ) -> NewBackupRecord {
        NewBackupRecord {
            filename: artifact.filename(),
            filepath: artifact.path.clone(),
            size_bytes: artifact.size_bytes,
            kind,
            content: artifact.content,
            hash_sha256: artifact.hash.clone(),
            encrypted: artifact.encrypted,
            created_at: now_local(),
            created_by,
            notes,
        }
    }

    fn with_id(self, id: u64) -> BackupRecord {
        BackupRecord {
            id,
            filename: self.filename,
            filepath: self.filepath,
            size_bytes: self.size_bytes,
            kind: self.kind,
            content: self.content,
            hash_sha256: self.hash_sha256,
            encrypted: self.encrypted,
            created_at: self.created_at,
            created_by: self.created_by,
            notes: self.notes,
        }
    }
}

/// Somewhere backup records are kept.
///
/// Callers serialize administrative actions, so implementations need no locking.
pub trait RecordStore {
    /// Store a new record and return it with its assigned id.
    fn insert(&self, record: NewBackupRecord) -> Result<BackupRecord>;

    /// Fetch one record, or None if there's no record with that id.
    fn get(&self, id: u64) -> Result<Option<BackupRecord>>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<BackupRecord>>;

    /// Remove a record, returning false if it was already absent.
    fn remove(&self, id: u64) -> Result<bool>;

    /// Fetch one record, failing if it's absent.
    fn require(&self, id: u64) -> Result<BackupRecord> {
        self.get(id)?.ok_or(Error::RecordNotFound { id })
    }
}

/// Records kept in a JSON file, rewritten whole on every change.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    next_id: u64,
    records: Vec<BackupRecord>,
}

impl Catalog {
    /// Name of the catalog file within the backup directory.
    pub const FILENAME: &'static str = "catalog.json";

    /// Use the catalog in a backup directory. The file is created when the
    /// first record is inserted.
    pub fn open(backup_dir: &Path) -> Catalog {
        Catalog {
            path: backup_dir.join(Catalog::FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CatalogFile> {
        let json = match fs::read(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!(path = ?self.path, "No catalog yet");
                return Ok(CatalogFile::default());
            }
            Err(err) => return Err(io_error(Stage::Catalog, &self.path)(err)),
        };
        serde_json::from_slice(&json).map_err(|source| Error::Catalog {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, catalog: &CatalogFile) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(io_error(Stage::Catalog, dir))?;
        let mut json = serde_json::to_vec_pretty(catalog).map_err(|source| Error::Catalog {
            path: self.path.clone(),
            source,
        })?;
        json.push(b'\n');
        let mut temp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempfile_in(dir)
            .map_err(io_error(Stage::Catalog, dir))?;
        temp.write_all(&json)
            .map_err(io_error(Stage::Catalog, temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(io_error(Stage::Catalog, temp.path()))?;
        temp.persist(&self.path)
            .map_err(|err| io_error(Stage::Catalog, &self.path)(err.error))?;
        Ok(())
    }
}

impl RecordStore for Catalog {
    fn insert(&self, record: NewBackupRecord) -> Result<BackupRecord> {
        let mut catalog = self.read()?;
        catalog.next_id = catalog.next_id.max(1);
        let record = record.with_id(catalog.next_id);
        catalog.next_id += 1;
        catalog.records.push(record.clone());
        self.write(&catalog)?;
        debug!(id = record.id, filename = record.filename, "Stored backup record");
        Ok(record)
    }

    fn get(&self, id: u64) -> Result<Option<BackupRecord>> {
        Ok(self.read()?.records.into_iter().find(|r| r.id == id))
    }

    fn list(&self) -> Result<Vec<BackupRecord>> {
        let mut records = self.read()?.records;
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(records)
    }

    fn remove(&self, id: u64) -> Result<bool> {
        let mut catalog = self.read()?;
        let before = catalog.records.len();
        catalog.records.retain(|r| r.id != id);
        if catalog.records.len() == before {
            return Ok(false);
        }
        self.write(&catalog)?;
        debug!(id, "Removed backup record");
        Ok(true)
    }
}
