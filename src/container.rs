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

//! Deflate-compressed zip containers holding snapshots, media and manifests.
//!
//! Full backups contain `database/<snapshot>`, `media/<relative path>` and
//! [MANIFEST_NAME]; database-only backups contain `<snapshot>` and the
//! manifest at the top level.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{io_error, zip_error};
use crate::{Error, Result, Stage};

/// Name of the plain-text manifest entry.
pub const MANIFEST_NAME: &str = "BACKUP_INFO.txt";

/// Directory inside full backups holding the database snapshot.
pub const DATABASE_DIR: &str = "database";

/// Directory inside full backups holding uploaded media.
pub const MEDIA_DIR: &str = "media";

pub(crate) fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Copy a file from disk into a new entry, streaming.
pub(crate) fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    archive_path: &Path,
    source: &Path,
    entry_name: &str,
) -> Result<()> {
    let mut file = File::open(source).map_err(io_error(Stage::Archive, source))?;
    zip.start_file(entry_name, deflated())
        .map_err(zip_error(Stage::Archive, archive_path))?;
    io::copy(&mut file, zip).map_err(io_error(Stage::Archive, source))?;
    trace!(?source, entry_name, "Added file to container");
    Ok(())
}

/// Add a text entry.
pub(crate) fn add_text<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    archive_path: &Path,
    entry_name: &str,
    text: &str,
) -> Result<()> {
    zip.start_file(entry_name, deflated())
        .map_err(zip_error(Stage::Archive, archive_path))?;
    zip.write_all(text.as_bytes())
        .map_err(io_error(Stage::Archive, archive_path))
}

/// Add every regular file under `root`, named by its path relative to
/// `root` with `/` separators and an optional `prefix` directory.
///
/// Returns the number of files added. Symlinks and special files are skipped,
/// as is the directory `exclude` if it lies inside `root`.
pub(crate) fn add_tree<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    archive_path: &Path,
    root: &Path,
    prefix: Option<&str>,
    exclude: Option<&Path>,
) -> Result<usize> {
    let excluded = exclude.and_then(|dir| fs::canonicalize(dir).ok());
    let mut count = 0;
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && excluded.is_some()
                && fs::canonicalize(entry.path()).ok() == excluded)
        });
    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_owned();
            Error::Io {
                stage: Stage::Archive,
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let mut name: String = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if let Some(prefix) = prefix {
            name = format!("{prefix}/{name}");
        }
        add_file(zip, archive_path, entry.path(), &name)?;
        count += 1;
    }
    debug!(?root, count, "Added tree to container");
    Ok(count)
}

/// Finish writing a container whose output is a buffered file.
pub(crate) fn finish<W: Write + Seek>(zip: ZipWriter<W>, archive_path: &Path) -> Result<W> {
    zip.finish().map_err(zip_error(Stage::Archive, archive_path))
}

/// Open a new container writing to `file`.
pub(crate) fn create(file: File) -> ZipWriter<BufWriter<File>> {
    ZipWriter::new(BufWriter::new(file))
}

fn open(path: &Path, stage: Stage) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(io_error(stage, path))?;
    ZipArchive::new(file).map_err(zip_error(stage, path))
}

/// True if the file is a readable zip container.
pub fn is_container(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(io_error(Stage::Extract, path))?;
    Ok(ZipArchive::new(file).is_ok())
}

/// Names of all entries, in container order.
pub fn entry_names(path: &Path) -> Result<Vec<String>> {
    let zip = open(path, Stage::Extract)?;
    Ok(zip.file_names().map(str::to_owned).collect())
}

/// Read the manifest text, if the container has one.
pub fn read_manifest(path: &Path) -> Result<Option<String>> {
    let mut zip = open(path, Stage::Extract)?;
    let mut entry = match zip.by_name(MANIFEST_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(zip_error(Stage::Extract, path)(err)),
    };
    let mut text = String::new();
    io::Read::read_to_string(&mut entry, &mut text).map_err(io_error(Stage::Extract, path))?;
    Ok(Some(text))
}

/// True if an entry name is where a database snapshot is stored: either at
/// the top level, or directly in [DATABASE_DIR].
fn is_snapshot_entry(name: &str, extension: &str) -> bool {
    let Some(stem_dot) = name.strip_suffix(extension) else {
        return false;
    };
    if !stem_dot.ends_with('.') {
        return false;
    }
    match name.split_once('/') {
        None => true,
        Some((dir, rest)) => dir == DATABASE_DIR && !rest.contains('/'),
    }
}

/// Extract the database snapshot with the given extension into `dest_dir`.
///
/// Fails with [Error::MissingDatabaseEntry] if there is none.
pub(crate) fn extract_snapshot(
    path: &Path,
    extension: &'static str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let mut zip = open(path, Stage::Extract)?;
    let name = zip
        .file_names()
        .find(|name| is_snapshot_entry(name, extension))
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingDatabaseEntry {
            path: path.to_owned(),
            extension,
        })?;
    let mut entry = zip.by_name(&name).map_err(zip_error(Stage::Extract, path))?;
    // Only use a fixed name inside the scratch directory, never the entry's path.
    let dest = dest_dir.join(format!("extracted.{extension}"));
    let mut out = File::create(&dest).map_err(io_error(Stage::Extract, &dest))?;
    io::copy(&mut entry, &mut out).map_err(io_error(Stage::Extract, &dest))?;
    out.flush().map_err(io_error(Stage::Extract, &dest))?;
    debug!(?path, entry = name, ?dest, "Extracted snapshot");
    Ok(dest)
}
