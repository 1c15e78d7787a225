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

//! Generally useful functions.

use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

/// Current time in the local zone, or UTC if the local offset can't be determined.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format a time as `YYYYMMDD_HHMMSS`, as used in artifact names.
pub fn timestamp(t: OffsetDateTime) -> String {
    t.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .expect("format timestamp")
}

/// A path in `dir` named `{stem}_{stamp}{suffix}` that doesn't exist yet.
///
/// Several backups made in the same second get `_2`, `_3`, ... after the stamp.
pub fn unique_path(dir: &Path, stem: &str, stamp: &str, suffix: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}_{stamp}{suffix}"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{stamp}_{n}{suffix}"));
        n += 1;
    }
    path
}

/// Human readable size in B, KB, MB or GB, with binary multiples.
pub fn format_bytes(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size < KB {
        format!("{size} B")
    } else if size < MB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else if size < GB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else {
        format!("{:.2} GB", size as f64 / GB as f64)
    }
}

/// Format a count with thousands separators.
pub fn thousands(n: u64) -> String {
    use thousands::Separable;
    n.separate_with_commas()
}
