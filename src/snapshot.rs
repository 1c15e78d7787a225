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

//! Point-in-time database snapshots.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use fail::fail_point;
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, instrument};

use crate::backup::persist;
use crate::errors::{io_error, sqlite_error};
use crate::misc::{now_local, timestamp, unique_path};
use crate::tool::run_tool;
use crate::*;

/// Pages copied per step of the SQLite online backup.
const SQLITE_PAGES_PER_STEP: std::os::raw::c_int = 100;

/// Pause between steps, so writers to the live database can make progress.
const SQLITE_STEP_PAUSE: Duration = Duration::from_millis(10);

impl Guardian {
    /// Export the database to a new `oasis_db_<stamp>.sqlite3` or `.sql`
    /// file in the backup directory, and return its path.
    ///
    /// The caller owns the file. Nothing is left behind if the export fails.
    #[instrument(skip(self))]
    pub fn snapshot_database(&self) -> Result<PathBuf> {
        let stamp = timestamp(now_local());
        let extension = self.database().snapshot_extension();
        let dest = unique_path(self.backup_dir(), "oasis_db", &stamp, &format!(".{extension}"));
        let temp = self.new_temp_file(Stage::Snapshot)?;
        match self.database() {
            Database::Sqlite { path } => snapshot_sqlite(path, temp.path())?,
            Database::Mysql(settings) => {
                snapshot_mysql(settings, temp.as_file(), temp.path(), self.tool_timeout())?
            }
        }
        fail_point!("oasis::snapshot::before-persist", |_| {
            Err(Error::Io {
                stage: Stage::Snapshot,
                path: dest.clone(),
                source: std::io::Error::other("injected failure"),
            })
        });
        persist(temp, &dest, Stage::Snapshot)?;
        info!(?dest, engine = self.database().engine_name(), "Database snapshot written");
        Ok(dest)
    }
}

/// Copy a live SQLite database with the online backup API, which gives a
/// consistent copy even while other connections write to it.
fn snapshot_sqlite(db_path: &Path, dest: &Path) -> Result<()> {
    if !db_path.is_file() {
        return Err(Error::NotFound {
            path: db_path.to_owned(),
        });
    }
    let src = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(sqlite_error(Stage::Snapshot, db_path))?;
    let mut dst = Connection::open(dest).map_err(sqlite_error(Stage::Snapshot, dest))?;
    {
        let backup = Backup::new(&src, &mut dst).map_err(sqlite_error(Stage::Snapshot, dest))?;
        backup
            .run_to_completion(SQLITE_PAGES_PER_STEP, SQLITE_STEP_PAUSE, None)
            .map_err(sqlite_error(Stage::Snapshot, db_path))?;
    }
    dst.close()
        .map_err(|(_, err)| sqlite_error(Stage::Snapshot, dest)(err))?;
    Ok(())
}

/// Dump a MySQL database in one transaction, with output going to `out`.
///
/// A failed or timed out dump is an error; the caller discards the partial output.
fn snapshot_mysql(
    settings: &MysqlSettings,
    out: &File,
    out_path: &Path,
    timeout: Duration,
) -> Result<()> {
    let stdout = out.try_clone().map_err(io_error(Stage::Snapshot, out_path))?;
    let mut command = Command::new(&settings.dump_command);
    command
        .args(settings.connection_args())
        .args(["--single-transaction", "--routines", "--triggers"])
        .arg(&settings.name)
        .env("MYSQL_PWD", &settings.password);
    run_tool(command, Stdio::null(), Stdio::from(stdout), timeout)
}
