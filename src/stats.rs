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

//! Summary of stored backups and the space left for more.

use std::fmt;
use std::path::{Path, PathBuf};

use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::misc::{format_bytes, now_local, thousands};
use crate::*;

/// Backups older than this are worth a warning.
pub const STALE_AFTER: Duration = Duration::hours(24);

/// Space on the filesystem holding the backup directory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    /// Bytes available to unprivileged users.
    pub free: u64,
    pub total: u64,
    /// Percentage of the filesystem in use, to one decimal place.
    pub used_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size: u64,
    pub total_size_display: String,
    pub last_backup: Option<BackupRecord>,
    /// None if it couldn't be measured.
    pub disk: Option<DiskUsage>,
    pub backup_dir: PathBuf,
    /// True if there are no backups, or the newest is more than a day old.
    pub stale: bool,
}

/// Count and measure the stored backups.
pub fn backup_stats(store: &dyn RecordStore, backup_dir: &Path) -> Result<BackupStats> {
    let records = store.list()?;
    let total_size = records.iter().map(|r| r.size_bytes).sum();
    let last_backup = records.first().cloned();
    let stale = is_stale(last_backup.as_ref(), now_local());
    let disk = match disk_usage(backup_dir) {
        Ok(disk) => Some(disk),
        Err(err) => {
            warn!(?backup_dir, %err, "Can't measure disk usage");
            None
        }
    };
    Ok(BackupStats {
        total_backups: records.len(),
        total_size,
        total_size_display: format_bytes(total_size),
        last_backup,
        disk,
        backup_dir: backup_dir.to_owned(),
        stale,
    })
}

fn is_stale(last_backup: Option<&BackupRecord>, now: OffsetDateTime) -> bool {
    last_backup.map_or(true, |r| now - r.created_at > STALE_AFTER)
}

#[cfg(unix)]
fn disk_usage(path: &Path) -> Result<DiskUsage> {
    use nix::sys::statvfs::statvfs;

    let vfs = statvfs(path).map_err(|errno| Error::Io {
        stage: Stage::Stats,
        path: path.to_owned(),
        source: errno.into(),
    })?;
    let fragment = vfs.fragment_size() as u64;
    let total = vfs.blocks() as u64 * fragment;
    let free = vfs.blocks_available() as u64 * fragment;
    let used = total.saturating_sub(vfs.blocks_free() as u64 * fragment);
    let used_pct = if total > 0 {
        (used as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    Ok(DiskUsage {
        free,
        total,
        used_pct,
    })
}

#[cfg(not(unix))]
fn disk_usage(path: &Path) -> Result<DiskUsage> {
    Err(Error::Io {
        stage: Stage::Stats,
        path: path.to_owned(),
        source: std::io::Error::from(std::io::ErrorKind::Unsupported),
    })
}

impl fmt::Display for BackupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} backups, {} total",
            thousands(self.total_backups as u64),
            self.total_size_display
        )?;
        match &self.last_backup {
            Some(last) => writeln!(f, "{:>12} last backup ({})", last.filename, last.created_at)?,
            None => writeln!(f, "{:>12} last backup", "none")?,
        }
        if let Some(disk) = &self.disk {
            writeln!(
                f,
                "{:>12} free of {} ({}% used) in {}",
                format_bytes(disk.free),
                format_bytes(disk.total),
                disk.used_pct,
                self.backup_dir.display()
            )?;
        }
        if self.stale {
            writeln!(f, "Warning: no backup in the last 24 hours")?;
        }
        Ok(())
    }
}
