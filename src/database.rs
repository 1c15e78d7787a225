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

//! The database to back up, resolved from a Django-style connection descriptor.

use std::convert::TryFrom;
use std::path::PathBuf;

use serde::Deserialize;

use crate::Error;

/// Connection settings as written in the configuration, using the key names
/// of Django's `DATABASES['default']`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    #[serde(rename = "ENGINE")]
    pub engine: String,
    /// Database file for SQLite, schema name for MySQL.
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "HOST", default)]
    pub host: Option<String>,
    #[serde(rename = "PORT", default)]
    pub port: Option<u16>,
    #[serde(rename = "USER", default)]
    pub user: Option<String>,
    #[serde(rename = "PASSWORD", default)]
    pub password: Option<String>,
    #[serde(rename = "DUMP_COMMAND", default)]
    pub dump_command: Option<PathBuf>,
    #[serde(rename = "CLIENT_COMMAND", default)]
    pub client_command: Option<PathBuf>,
}

/// A database engine we know how to snapshot and restore.
///
/// Any other engine is rejected when the settings are resolved, not when
/// the first backup is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "DatabaseSettings")]
pub enum Database {
    /// A single-file database, copied with SQLite's online backup API.
    Sqlite { path: PathBuf },
    /// A MySQL server, dumped with `mysqldump` and restored with `mysql`.
    Mysql(MysqlSettings),
}

#[derive(Clone, PartialEq, Eq)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub dump_command: PathBuf,
    pub client_command: PathBuf,
}

impl std::fmt::Debug for MysqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("dump_command", &self.dump_command)
            .field("client_command", &self.client_command)
            .finish_non_exhaustive()
    }
}

impl MysqlSettings {
    /// Settings for a server with the default tools and port.
    pub fn new(host: &str, user: &str, password: &str, name: &str) -> MysqlSettings {
        MysqlSettings {
            host: host.to_owned(),
            port: 3306,
            user: user.to_owned(),
            password: password.to_owned(),
            name: name.to_owned(),
            dump_command: PathBuf::from("mysqldump"),
            client_command: PathBuf::from("mysql"),
        }
    }

    /// Connection arguments shared by `mysqldump` and `mysql`.
    ///
    /// The password is passed in the environment, not on the command line.
    pub(crate) fn connection_args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.user),
        ]
    }
}

/// Engine families, recognized from an `ENGINE` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineKind {
    Sqlite,
    Mysql,
}

impl EngineKind {
    fn parse(engine: &str) -> Option<EngineKind> {
        // Accept both "django.db.backends.sqlite3" and a bare "sqlite3".
        let last = engine.rsplit('.').next().unwrap_or(engine);
        match last {
            "sqlite3" | "sqlite" => Some(EngineKind::Sqlite),
            "mysql" => Some(EngineKind::Mysql),
            _ => None,
        }
    }
}

impl TryFrom<DatabaseSettings> for Database {
    type Error = Error;

    fn try_from(settings: DatabaseSettings) -> Result<Database, Error> {
        match EngineKind::parse(&settings.engine) {
            Some(EngineKind::Sqlite) => Ok(Database::Sqlite {
                path: PathBuf::from(settings.name),
            }),
            Some(EngineKind::Mysql) => Ok(Database::Mysql(MysqlSettings {
                host: settings.host.unwrap_or_else(|| "localhost".to_owned()),
                port: settings.port.unwrap_or(3306),
                user: settings.user.unwrap_or_default(),
                password: settings.password.unwrap_or_default(),
                name: settings.name,
                dump_command: settings
                    .dump_command
                    .unwrap_or_else(|| PathBuf::from("mysqldump")),
                client_command: settings
                    .client_command
                    .unwrap_or_else(|| PathBuf::from("mysql")),
            })),
            None => Err(Error::UnsupportedEngine {
                engine: settings.engine,
            }),
        }
    }
}

impl Database {
    /// Short engine name, as written into backup manifests.
    pub fn engine_name(&self) -> &'static str {
        match self {
            Database::Sqlite { .. } => "sqlite3",
            Database::Mysql(_) => "mysql",
        }
    }

    /// Description of the database without credentials, for manifests and logs.
    pub fn descriptor(&self) -> String {
        match self {
            Database::Sqlite { path } => format!("sqlite3 {}", path.display()),
            Database::Mysql(m) => format!("mysql {}@{}:{}/{}", m.user, m.host, m.port, m.name),
        }
    }

    /// File extension of raw snapshots, also used to find them inside containers.
    pub(crate) fn snapshot_extension(&self) -> &'static str {
        match self {
            Database::Sqlite { .. } => "sqlite3",
            Database::Mysql(_) => "sql",
        }
    }
}
