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

//! Make backups: snapshot the database, fold it and the media into one
//! container, optionally encrypt, and hash what will be stored.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fail::fail_point;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, instrument, warn};

use crate::container::{self, DATABASE_DIR, MANIFEST_NAME, MEDIA_DIR};
use crate::errors::io_error;
use crate::misc::{now_local, timestamp, unique_path};
use crate::record::BackupContent;
use crate::*;

/// Default limit on how long `mysqldump` or `mysql` may run.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Makes and restores backups of one database and media tree, keeping
/// artifacts in one backup directory.
#[derive(Debug)]
pub struct Guardian {
    backup_dir: PathBuf,
    database: Database,
    media_root: Option<PathBuf>,
    key: Key,
    tool_timeout: Duration,
}

/// A backup artifact that was just written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// SHA-256 of the file as stored, so of the ciphertext if encrypted.
    pub hash: String,
    pub size_bytes: u64,
    pub encrypted: bool,
    pub content: BackupContent,
}

impl Artifact {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Guardian {
    /// Make a Guardian keeping artifacts in `backup_dir`, which is created
    /// when it's first needed.
    pub fn new(backup_dir: &Path, database: Database, key: Key) -> Guardian {
        Guardian {
            backup_dir: backup_dir.to_owned(),
            database,
            media_root: None,
            key,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config, key: Key) -> Guardian {
        Guardian::new(&config.backup_dir, config.database.clone(), key)
            .with_media_root(config.media_root.clone())
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
    }

    /// Include the uploads under this directory in full backups.
    pub fn with_media_root(self, media_root: Option<PathBuf>) -> Guardian {
        Guardian { media_root, ..self }
    }

    pub fn with_tool_timeout(self, tool_timeout: Duration) -> Guardian {
        Guardian {
            tool_timeout,
            ..self
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub(crate) fn key(&self) -> &Key {
        &self.key
    }

    pub(crate) fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// The media root, if one is configured and it exists.
    pub(crate) fn existing_media_root(&self) -> Option<&Path> {
        self.media_root.as_deref().filter(|p| p.is_dir())
    }

    fn ensure_backup_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.backup_dir).map_err(io_error(Stage::Scratch, &self.backup_dir))
    }

    /// A temporary file in the backup directory, deleted unless it's persisted.
    pub(crate) fn new_temp_file(&self, stage: Stage) -> Result<NamedTempFile> {
        self.ensure_backup_dir()?;
        tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempfile_in(&self.backup_dir)
            .map_err(io_error(stage, &self.backup_dir))
    }

    /// A scratch directory in the backup directory, deleted when dropped.
    pub(crate) fn scratch_dir(&self) -> Result<TempDir> {
        self.ensure_backup_dir()?;
        tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempdir_in(&self.backup_dir)
            .map_err(io_error(Stage::Scratch, &self.backup_dir))
    }

    /// Back up the database and every media file into one container.
    #[instrument(skip(self))]
    pub fn create_full_backup(&self, encrypt: bool) -> Result<Artifact> {
        let stamp = timestamp(now_local());
        let snapshot = Intermediate(self.snapshot_database()?);
        let temp = self.new_temp_file(Stage::Archive)?;
        let archive_path = temp.path().to_owned();
        let file = temp
            .as_file()
            .try_clone()
            .map_err(io_error(Stage::Archive, &archive_path))?;
        let mut zip = container::create(file);
        container::add_file(
            &mut zip,
            &archive_path,
            &snapshot.0,
            &format!("{DATABASE_DIR}/{}", snapshot.name()),
        )?;
        let media_files = match self.existing_media_root() {
            Some(root) => container::add_tree(
                &mut zip,
                &archive_path,
                root,
                Some(MEDIA_DIR),
                Some(&self.backup_dir),
            )?,
            None => 0,
        };
        container::add_text(
            &mut zip,
            &archive_path,
            MANIFEST_NAME,
            &self.manifest(&stamp, BackupContent::Full),
        )?;
        container::finish(zip, &archive_path)?
            .flush()
            .map_err(io_error(Stage::Archive, &archive_path))?;
        drop(snapshot);
        debug!(media_files, "Full backup container written");
        fail_point!("oasis::backup::before-seal", |_| {
            Err(Error::Io {
                stage: Stage::Archive,
                path: archive_path.clone(),
                source: std::io::Error::other("injected failure"),
            })
        });
        self.seal(temp, "oasis_full", &stamp, encrypt, BackupContent::Full)
    }

    /// Back up only the database, still wrapped in a container with a manifest.
    #[instrument(skip(self))]
    pub fn create_db_only_backup(&self, encrypt: bool) -> Result<Artifact> {
        let stamp = timestamp(now_local());
        let snapshot = Intermediate(self.snapshot_database()?);
        let temp = self.new_temp_file(Stage::Archive)?;
        let archive_path = temp.path().to_owned();
        let file = temp
            .as_file()
            .try_clone()
            .map_err(io_error(Stage::Archive, &archive_path))?;
        let mut zip = container::create(file);
        container::add_file(&mut zip, &archive_path, &snapshot.0, &snapshot.name())?;
        container::add_text(
            &mut zip,
            &archive_path,
            MANIFEST_NAME,
            &self.manifest(&stamp, BackupContent::Database),
        )?;
        container::finish(zip, &archive_path)?
            .flush()
            .map_err(io_error(Stage::Archive, &archive_path))?;
        drop(snapshot);
        self.seal(temp, "oasis_db", &stamp, encrypt, BackupContent::Database)
    }

    /// Move a finished container to its final name, through the cipher if
    /// asked, and hash the result.
    pub(crate) fn seal(
        &self,
        plain: NamedTempFile,
        stem: &str,
        stamp: &str,
        encrypt: bool,
        content: BackupContent,
    ) -> Result<Artifact> {
        let suffix = if encrypt { ".zip.enc" } else { ".zip" };
        let path = unique_path(&self.backup_dir, stem, stamp, suffix);
        if encrypt {
            let encrypted = self.new_temp_file(Stage::Encrypt)?;
            let source = plain.reopen().map_err(io_error(Stage::Encrypt, plain.path()))?;
            let dest = encrypted
                .as_file()
                .try_clone()
                .map_err(io_error(Stage::Encrypt, encrypted.path()))?;
            cipher::encrypt(&self.key, BufReader::new(source), BufWriter::new(dest))
                .map_err(io_error(Stage::Encrypt, encrypted.path()))?;
            persist(encrypted, &path, Stage::Encrypt)?;
            // The plaintext container is deleted when `plain` drops.
        } else {
            persist(plain, &path, Stage::Archive)?;
        }
        match hash_and_size(&path) {
            Ok((hash, size_bytes)) => {
                info!(
                    ?path,
                    size_bytes,
                    hash_prefix = &hash[..16],
                    encrypted = encrypt,
                    "Backup created"
                );
                Ok(Artifact {
                    path,
                    hash,
                    size_bytes,
                    encrypted: encrypt,
                    content,
                })
            }
            Err(err) => {
                // Don't leave an artifact that nothing describes.
                let _ = fs::remove_file(&path);
                Err(err)
            }
        }
    }

    /// Text of the manifest entry.
    fn manifest(&self, stamp: &str, content: BackupContent) -> String {
        let kind = match content {
            BackupContent::Full => "Full (DB + Media)",
            BackupContent::Database => "Database only",
            BackupContent::Media => "Media only",
        };
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "OASIS Backup\n\
             Date: {stamp}\n\
             Type: {kind}\n\
             Guardian version: {version}\n\
             Engine: {engine}\n\
             Database: {descriptor}\n\
             Host: {host}\n",
            version = crate::VERSION,
            engine = self.database.engine_name(),
            descriptor = self.database.descriptor(),
        )
    }
}

fn hash_and_size(path: &Path) -> Result<(String, u64)> {
    let hash = integrity::digest(path)?;
    let size = fs::metadata(path).map_err(io_error(Stage::Hash, path))?.len();
    Ok((hash, size))
}

/// Give a temporary file its final name, failing rather than replacing an existing file.
pub(crate) fn persist(temp: NamedTempFile, dest: &Path, stage: Stage) -> Result<()> {
    temp.persist_noclobber(dest)
        .map(|_| ())
        .map_err(|err| io_error(stage, dest)(err.error))
}

/// A file folded into a later stage, removed when dropped whether or not
/// that stage succeeded.
struct Intermediate(PathBuf);

impl Intermediate {
    fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Drop for Intermediate {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => debug!(path = ?self.0, "Removed intermediate file"),
            Err(err) => warn!(path = ?self.0, ?err, "Failed to remove intermediate file"),
        }
    }
}
