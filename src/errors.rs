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

//! Guardian error types.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_more::Display;
use thiserror::Error;

/// Step of a backup or restore pipeline, reported with IO failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Stage {
    #[strum(serialize = "database snapshot")]
    Snapshot,
    #[strum(serialize = "archive")]
    Archive,
    #[strum(serialize = "encrypt")]
    Encrypt,
    #[strum(serialize = "decrypt")]
    Decrypt,
    #[strum(serialize = "hash")]
    Hash,
    #[strum(serialize = "extract")]
    Extract,
    #[strum(serialize = "safety copy")]
    SafetyCopy,
    #[strum(serialize = "overwrite")]
    Overwrite,
    #[strum(serialize = "scratch")]
    Scratch,
    #[strum(serialize = "catalog")]
    Catalog,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "download")]
    Download,
    #[strum(serialize = "statistics")]
    Stats,
    #[strum(serialize = "configuration")]
    Config,
}

/// Guardian specific error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("Backup artifact not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("No backup record with id {id}")]
    RecordNotFound { id: u64 },

    #[error(
        "Hash mismatch on {path:?}: expected SHA-256 {expected}, found {actual}; \
         the backup may have been altered"
    )]
    IntegrityFailure {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("No SHA-256 hash is recorded for backup {id}")]
    NoRecordedHash { id: u64 },

    #[error("{path:?} is not a valid OASIS encrypted backup: {details}")]
    NotEncryptedBackup { path: PathBuf, details: String },

    #[error("No {extension} file found in backup container {path:?}")]
    MissingDatabaseEntry {
        path: PathBuf,
        extension: &'static str,
    },

    #[error("{path:?} is neither a backup container nor a {expected} file")]
    UnrecognizedContent {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Database engine {engine:?} is not supported for backup or restore")]
    UnsupportedEngine { engine: String },

    #[error("Failed to start {tool}: {source}")]
    ToolSpawn { tool: String, source: io::Error },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("IO error during {stage} on {path:?}: {source}")]
    Io {
        stage: Stage,
        path: PathBuf,
        source: io::Error,
    },

    #[error("SQLite error during {stage} on {path:?}: {source}")]
    Sqlite {
        stage: Stage,
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Archive container error during {stage} on {path:?}: {source}")]
    Zip {
        stage: Stage,
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Backup catalog {path:?} can't be read: {source}")]
    Catalog {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to load configuration {path:?}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Password confirmation failed for {username:?}: restore requires re-authentication")]
    ReauthenticationFailed { username: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// General categories of errors, as seen by an administrator.
#[derive(Debug, Display, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    #[display(fmt = "Not found")]
    NotFound,

    #[display(fmt = "Integrity failure")]
    Integrity,

    #[display(fmt = "Format error")]
    Format,

    #[display(fmt = "Unsupported engine")]
    UnsupportedEngine,

    #[display(fmt = "External tool failure")]
    ExternalTool,

    #[display(fmt = "IO failure")]
    Io,

    #[display(fmt = "Unauthorized")]
    Unauthorized,

    #[display(fmt = "Configuration error")]
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } | Error::RecordNotFound { .. } => ErrorKind::NotFound,
            Error::IntegrityFailure { .. } | Error::NoRecordedHash { .. } => ErrorKind::Integrity,
            Error::NotEncryptedBackup { .. }
            | Error::MissingDatabaseEntry { .. }
            | Error::UnrecognizedContent { .. } => ErrorKind::Format,
            Error::Zip {
                source: zip::result::ZipError::Io(_),
                ..
            } => ErrorKind::Io,
            Error::Zip { .. } => ErrorKind::Format,
            Error::UnsupportedEngine { .. } => ErrorKind::UnsupportedEngine,
            Error::ToolSpawn { .. } | Error::ToolFailed { .. } | Error::ToolTimeout { .. } => {
                ErrorKind::ExternalTool
            }
            Error::Io { .. } | Error::Sqlite { .. } | Error::Catalog { .. } => ErrorKind::Io,
            Error::ReauthenticationFailed { .. } => ErrorKind::Unauthorized,
            Error::Config { .. } => ErrorKind::Config,
        }
    }

    /// The pipeline stage where this error happened, if it's known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Io { stage, .. } | Error::Sqlite { stage, .. } | Error::Zip { stage, .. } => {
                Some(*stage)
            }
            Error::Catalog { .. } => Some(Stage::Catalog),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Make a closure that wraps an IO error with the stage and path where it happened.
pub(crate) fn io_error(stage: Stage, path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Io {
        stage,
        path: path.to_owned(),
        source,
    }
}

pub(crate) fn zip_error(stage: Stage, path: &Path) -> impl FnOnce(zip::result::ZipError) -> Error + '_ {
    move |source| Error::Zip {
        stage,
        path: path.to_owned(),
        source,
    }
}

pub(crate) fn sqlite_error(stage: Stage, path: &Path) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |source| Error::Sqlite {
        stage,
        path: path.to_owned(),
        source,
    }
}
