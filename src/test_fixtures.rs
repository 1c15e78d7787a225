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

/// Utilities to set up test environments.
///
/// Fixtures that create directories will be automatically deleted when the object
/// is deleted.
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::*;

/// Secret the fixtures derive their cipher key from.
pub const TEST_SECRET: &[u8] = b"oasis-test-secret";

/// Administrator configured by [ScratchSite::write_config].
pub const TEST_ADMIN: &str = "admin";

pub const TEST_ADMIN_PASSWORD: &str = "correct horse";

/// A temporary deployment: a SQLite database with one table holding one
/// row, a small media tree, and an empty backup directory.
pub struct ScratchSite {
    _tempdir: TempDir, // held only for cleanup
    root: PathBuf,
}

impl ScratchSite {
    pub fn new() -> ScratchSite {
        let tempdir = TempDir::new().unwrap();
        let root = tempdir.path().to_path_buf();
        let site = ScratchSite {
            _tempdir: tempdir,
            root,
        };
        let conn = Connection::open(site.db_path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE proyectos (id INTEGER PRIMARY KEY, titulo TEXT NOT NULL);
             INSERT INTO proyectos (titulo) VALUES ('Sistema de riego');",
        )
        .unwrap();
        drop(conn);
        fs::create_dir_all(site.media_root().join("proyectos/2026")).unwrap();
        fs::write(site.media_root().join("logo.png"), b"\x89PNG fake logo").unwrap();
        fs::write(
            site.media_root().join("proyectos/2026/tesis.pdf"),
            b"%PDF-1.4 fake thesis",
        )
        .unwrap();
        fs::create_dir(site.backup_dir()).unwrap();
        site
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("db.sqlite3")
    }

    pub fn media_root(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn database(&self) -> Database {
        Database::Sqlite {
            path: self.db_path(),
        }
    }

    pub fn key(&self) -> Key {
        derive_key(TEST_SECRET)
    }

    /// A Guardian for this site, including its media.
    pub fn guardian(&self) -> Guardian {
        Guardian::new(&self.backup_dir(), self.database(), self.key())
            .with_media_root(Some(self.media_root()))
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::open(&self.backup_dir())
    }

    pub fn insert_row(&self, titulo: &str) {
        Connection::open(self.db_path())
            .unwrap()
            .execute("INSERT INTO proyectos (titulo) VALUES (?1)", [titulo])
            .unwrap();
    }

    /// Titles in the live database, in id order.
    pub fn titles(&self) -> Vec<String> {
        let conn = Connection::open(self.db_path()).unwrap();
        let mut stmt = conn
            .prepare("SELECT titulo FROM proyectos ORDER BY id")
            .unwrap();
        let titles = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap();
        titles
    }

    /// Names of files and directories in the backup directory, sorted.
    pub fn backup_dir_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.backup_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Names in the backup directory that look like leftover temporary files.
    pub fn stale_temp_names(&self) -> Vec<String> {
        self.backup_dir_names()
            .into_iter()
            .filter(|n| n.starts_with(TMP_PREFIX))
            .collect()
    }

    /// Write a configuration file for this site, with one administrator,
    /// and return its path.
    pub fn write_config(&self) -> PathBuf {
        let password_hash = hex::encode(Sha256::digest(TEST_ADMIN_PASSWORD.as_bytes()));
        let config = serde_json::json!({
            "backup_dir": self.backup_dir(),
            "media_root": self.media_root(),
            "database": {
                "ENGINE": "django.db.backends.sqlite3",
                "NAME": self.db_path(),
            },
            "admins": { TEST_ADMIN: password_hash },
        });
        let path = self.root.join("oasis-guardian.json");
        fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
        path
    }
}

impl Default for ScratchSite {
    fn default() -> Self {
        Self::new()
    }
}
