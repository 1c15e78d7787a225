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

//! Delete backups, singly or by retention policy.

use std::fs;
use std::io;

use itertools::Itertools;
use serde::Deserialize;
use time::Duration;
use tracing::{info, instrument, warn};

use crate::errors::io_error;
use crate::misc::now_local;
use crate::*;

/// How many backups to keep, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionPolicy {
    /// Backups older than this are deleted.
    pub max_age_days: u32,
    /// At most this many of the newest backups are kept.
    pub max_count: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            max_age_days: 30,
            max_count: 20,
        }
    }
}

/// Delete the artifact a record describes.
///
/// Returns false, without error, if it was already gone.
pub fn delete_backup_file(record: &BackupRecord) -> Result<bool> {
    match fs::remove_file(&record.filepath) {
        Ok(()) => {
            info!(id = record.id, path = ?record.filepath, "Deleted backup artifact");
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(id = record.id, path = ?record.filepath, "Backup artifact was already missing");
            Ok(false)
        }
        Err(err) => Err(io_error(Stage::Delete, &record.filepath)(err)),
    }
}

/// Delete the artifact and then the record.
pub(crate) fn delete_record(store: &dyn RecordStore, record: &BackupRecord) -> Result<bool> {
    let deleted = delete_backup_file(record)?;
    store.remove(record.id)?;
    Ok(deleted)
}

/// Delete backups older than the policy's age limit, then the oldest of
/// what remains until at most `max_count` are left.
///
/// Returns the number of records removed.
#[instrument(skip(store))]
pub fn cleanup_old_backups(store: &dyn RecordStore, policy: &RetentionPolicy) -> Result<usize> {
    // An age limit reaching past the earliest representable time expires nothing.
    let cutoff = now_local().checked_sub(Duration::days(policy.max_age_days.into()));
    let (expired, kept): (Vec<BackupRecord>, Vec<BackupRecord>) = store
        .list()?
        .into_iter()
        .partition(|r| cutoff.is_some_and(|cutoff| r.created_at < cutoff));
    let excess = kept
        .into_iter()
        .sorted_by_key(|r| (r.created_at, r.id))
        .rev()
        .skip(policy.max_count)
        .collect_vec();
    let mut removed = 0;
    for record in expired.iter().chain(excess.iter()) {
        delete_record(store, record)?;
        removed += 1;
    }
    info!(
        expired = expired.len(),
        excess = excess.len(),
        "Old backups cleaned up"
    );
    Ok(removed)
}
