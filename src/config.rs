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

//! Configuration file.
//!
//! The secret the cipher key is derived from is deliberately not here; it's
//! given separately to [crate::derive_key].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::database::DatabaseSettings;
use crate::errors::io_error;
use crate::*;

/// Settings for one OASIS deployment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where artifacts and the catalog are kept.
    pub backup_dir: PathBuf,

    /// Uploaded media to include in full backups.
    pub media_root: Option<PathBuf>,

    pub database: Database,

    /// Limit on how long external dump and restore tools may run.
    pub tool_timeout_secs: u64,

    pub retention: RetentionPolicy,

    /// Administrator usernames mapped to the hex SHA-256 of their password.
    pub admins: BTreeMap<String, String>,
}

/// The configuration as written, before the database engine is resolved.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backup_dir: PathBuf,
    #[serde(default)]
    media_root: Option<PathBuf>,
    /// Same keys as a Django `DATABASES` entry.
    database: DatabaseSettings,
    #[serde(default = "default_tool_timeout_secs")]
    tool_timeout_secs: u64,
    #[serde(default)]
    retention: RetentionPolicy,
    #[serde(default)]
    admins: BTreeMap<String, String>,
}

fn default_tool_timeout_secs() -> u64 {
    backup::DEFAULT_TOOL_TIMEOUT.as_secs()
}

impl Config {
    /// Load a JSON configuration file.
    ///
    /// An engine other than SQLite or MySQL fails here with
    /// [Error::UnsupportedEngine].
    pub fn load(path: &Path) -> Result<Config> {
        let json = fs::read(path).map_err(io_error(Stage::Config, path))?;
        let config = Config::parse(&json, path)?;
        debug!(?path, engine = config.database.engine_name(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration JSON that didn't come from a file.
    pub fn from_json(json: &[u8]) -> Result<Config> {
        Config::parse(json, Path::new("-"))
    }

    fn parse(json: &[u8], path: &Path) -> Result<Config> {
        let file: ConfigFile = serde_json::from_slice(json).map_err(|source| Error::Config {
            path: path.to_owned(),
            source,
        })?;
        Ok(Config {
            backup_dir: file.backup_dir,
            media_root: file.media_root,
            database: Database::try_from(file.database)?,
            tool_timeout_secs: file.tool_timeout_secs,
            retention: file.retention,
            admins: file.admins,
        })
    }
}
