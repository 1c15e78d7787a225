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

//! Tests for the Guardian library API.

use oasis_guardian::test_fixtures::ScratchSite;
use oasis_guardian::*;

mod cleanup;
#[cfg(unix)]
mod mysql;
mod restore;

/// Create a backup through the admin layer and return its record.
fn create(site: &ScratchSite, content: BackupContent, encrypt: bool) -> BackupRecord {
    oasis_guardian::admin::create_backup(
        &site.guardian(),
        &site.catalog(),
        content,
        encrypt,
        BackupOrigin::Manual,
        &Actor::new("admin"),
        None,
    )
    .expect("create backup")
}
