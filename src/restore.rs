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

//! Restore the live database from a backup record.
//!
//! Steps: check the artifact exists, check its hash, decrypt to scratch if
//! needed, make a safety copy of the live database, then overwrite it.
//!
//! This is not transactional. If the overwrite fails partway, the safety
//! copy is the way back; nothing rolls back automatically.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use fail::fail_point;
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::container;
use crate::errors::io_error;
use crate::tool::run_tool;
use crate::*;

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// What a successful restore did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Name of the artifact restored from.
    pub filename: String,
    /// Copy of the database as it was before the restore, if one was made.
    pub safety_copy: Option<PathBuf>,
    /// Message for the operator.
    pub message: String,
}

/// Where the safety copy of a SQLite database goes: `db.sqlite3` becomes
/// `db.pre_restore.sqlite3`.
pub fn safety_copy_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("pre_restore.sqlite3")
}

impl Guardian {
    /// Restore the configured database from the artifact a record describes.
    ///
    /// The hash is checked before anything touches the live database. Scratch
    /// files (decrypted copies, extracted snapshots) are removed however this
    /// returns. Running services keep their old connections, so they need a
    /// restart to see the restored data.
    #[instrument(skip(self, record), fields(record = record.id, filename = %record.filename))]
    pub fn restore_database(&self, record: &BackupRecord) -> Result<RestoreOutcome> {
        let artifact = record.filepath.as_path();
        if !artifact.is_file() {
            return Err(Error::NotFound {
                path: artifact.to_owned(),
            });
        }
        if let Some(expected) = record.recorded_hash() {
            let actual = integrity::digest(artifact)?;
            if !integrity::constant_time_eq(actual.as_bytes(), expected.as_bytes()) {
                warn!(?artifact, expected, actual, "Backup hash mismatch; refusing to restore");
                return Err(Error::IntegrityFailure {
                    path: artifact.to_owned(),
                    expected: expected.to_owned(),
                    actual,
                });
            }
            debug!("Backup hash verified");
        } else {
            warn!("No hash recorded; restoring without an integrity check");
        }

        // Everything temporary lives in here and goes when it drops.
        let scratch = self.scratch_dir()?;
        let work_path = if record.encrypted {
            let decrypted = scratch.path().join("decrypted");
            cipher::decrypt_file(self.key(), artifact, &decrypted)?;
            decrypted
        } else {
            artifact.to_owned()
        };

        let safety_copy = match self.database() {
            Database::Sqlite { path } => restore_sqlite(&work_path, path, scratch.path())?,
            Database::Mysql(settings) => {
                restore_mysql(&work_path, settings, scratch.path(), self.tool_timeout())?;
                None
            }
        };
        let scratch_path = scratch.path().to_owned();
        if let Err(err) = remove_scratch(scratch) {
            // The database is already replaced, so this doesn't fail the restore.
            warn!(?scratch_path, ?err, "Failed to remove restore scratch directory");
        }

        info!(?safety_copy, "Database restored");
        Ok(RestoreOutcome {
            filename: record.filename.clone(),
            safety_copy,
            message: format!(
                "Database restored from {}. Restart the server to apply the changes.",
                record.filename
            ),
        })
    }
}

/// Replace a SQLite database file with the snapshot in `backup_path`, which
/// is either a container holding one, or the database file itself.
///
/// Returns the safety copy path, if there was a live database to copy.
fn restore_sqlite(backup_path: &Path, db_path: &Path, scratch: &Path) -> Result<Option<PathBuf>> {
    let source = if container::is_container(backup_path)? {
        container::extract_snapshot(backup_path, "sqlite3", scratch)?
    } else if is_sqlite_file(backup_path)? {
        backup_path.to_owned()
    } else {
        return Err(Error::UnrecognizedContent {
            path: backup_path.to_owned(),
            expected: "SQLite database",
        });
    };
    let safety_copy = if db_path.is_file() {
        let safety = safety_copy_path(db_path);
        copy_with_mtime(db_path, &safety, Stage::SafetyCopy)?;
        info!(?safety, "Safety copy of the live database written");
        Some(safety)
    } else {
        warn!(?db_path, "No live database to make a safety copy of");
        None
    };
    fail_point!("oasis::restore::before-overwrite", |_| {
        Err(Error::Io {
            stage: Stage::Overwrite,
            path: db_path.to_owned(),
            source: io::Error::other("injected failure"),
        })
    });
    copy_with_mtime(&source, db_path, Stage::Overwrite)?;
    Ok(safety_copy)
}

fn remove_scratch(scratch: TempDir) -> io::Result<()> {
    fail_point!("oasis::restore::remove-scratch", |_| {
        Err(io::Error::other("injected failure"))
    });
    scratch.close()
}

/// True if the file starts with the SQLite database header.
fn is_sqlite_file(path: &Path) -> Result<bool> {
    let mut header = [0u8; 16];
    let mut file = File::open(path).map_err(io_error(Stage::Extract, path))?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(&header == SQLITE_HEADER),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(io_error(Stage::Extract, path)(err)),
    }
}

/// Feed a SQL dump, or a container holding one, to the `mysql` client.
fn restore_mysql(
    backup_path: &Path,
    settings: &MysqlSettings,
    scratch: &Path,
    timeout: std::time::Duration,
) -> Result<()> {
    let sql_path = if container::is_container(backup_path)? {
        container::extract_snapshot(backup_path, "sql", scratch)?
    } else {
        backup_path.to_owned()
    };
    let input = File::open(&sql_path).map_err(io_error(Stage::Overwrite, &sql_path))?;
    let mut command = Command::new(&settings.client_command);
    command
        .args(settings.connection_args())
        .arg(&settings.name)
        .env("MYSQL_PWD", &settings.password);
    run_tool(command, Stdio::from(input), Stdio::null(), timeout)
}

/// Copy contents and permissions, and carry over the modification time.
fn copy_with_mtime(from: &Path, to: &Path, stage: Stage) -> Result<()> {
    fs::copy(from, to).map_err(io_error(stage, to))?;
    let metadata = fs::metadata(from).map_err(io_error(stage, from))?;
    set_file_mtime(to, FileTime::from_last_modification_time(&metadata))
        .map_err(io_error(stage, to))?;
    Ok(())
}
