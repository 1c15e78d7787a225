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

//! OASIS Data Guardian: backups of the OASIS database and uploaded media.
//!
//! A [Guardian] snapshots the configured database, folds it (and optionally
//! the media tree) into a deflate zip with a manifest, optionally obfuscates
//! the result with the [cipher], and reports the SHA-256 of the stored
//! artifact. Restores verify that hash before anything touches the live
//! database.

pub mod admin;
pub mod backup;
pub mod cipher;
pub mod cleanup;
pub mod config;
pub mod container;
pub mod database;
pub mod errors;
pub mod integrity;
mod media;
pub mod misc;
pub mod record;
pub mod restore;
mod snapshot;
pub mod stats;
pub mod test_fixtures;
mod tool;
pub mod ui;

pub use crate::admin::{
    Actor, Authenticator, ConfiguredAdmins, Download, Reauthenticated, Verification,
};
pub use crate::backup::{Artifact, Guardian};
pub use crate::cipher::{derive_key, Key, MAGIC};
pub use crate::cleanup::{cleanup_old_backups, delete_backup_file, RetentionPolicy};
pub use crate::config::Config;
pub use crate::database::{Database, MysqlSettings};
pub use crate::errors::{Error, ErrorKind, Result, Stage};
pub use crate::misc::format_bytes;
pub use crate::record::{
    BackupContent, BackupOrigin, BackupRecord, Catalog, NewBackupRecord, RecordStore,
};
pub use crate::restore::RestoreOutcome;
pub use crate::stats::{backup_stats, BackupStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}

/// All streaming reads and writes go through buffers of this size.
pub const CHUNK_SIZE: usize = 8192;

/// Temporary files and directories in the backup directory start with this.
pub const TMP_PREFIX: &str = "tmp-oasis";
