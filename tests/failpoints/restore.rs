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

//! Simulate failures during restore.

use std::fs;

use fail::FailScenario;

use oasis_guardian::restore::safety_copy_path;
use oasis_guardian::test_fixtures::ScratchSite;
use oasis_guardian::*;

#[test]
fn failed_overwrite_cleans_scratch_and_keeps_safety_copy() {
    let scenario = FailScenario::setup();
    let site = ScratchSite::new();
    let guardian = site.guardian();
    let artifact = guardian.create_full_backup(true).unwrap();
    let record = site
        .catalog()
        .insert(NewBackupRecord::from_artifact(
            &artifact,
            BackupOrigin::Manual,
            None,
            String::new(),
        ))
        .unwrap();
    site.insert_row("Agregado despues");
    let before = fs::read(site.db_path()).unwrap();

    fail::cfg("oasis::restore::before-overwrite", "return").unwrap();
    let err = guardian.restore_database(&record).unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Overwrite));
    assert_eq!(fs::read(site.db_path()).unwrap(), before);
    assert_eq!(fs::read(safety_copy_path(&site.db_path())).unwrap(), before);
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
    scenario.teardown();
}

#[test]
fn scratch_removal_failure_does_not_fail_a_finished_restore() {
    let scenario = FailScenario::setup();
    let site = ScratchSite::new();
    let guardian = site.guardian();
    let artifact = guardian.create_db_only_backup(true).unwrap();
    let record = site
        .catalog()
        .insert(NewBackupRecord::from_artifact(
            &artifact,
            BackupOrigin::Manual,
            None,
            String::new(),
        ))
        .unwrap();
    site.insert_row("Agregado despues");

    fail::cfg("oasis::restore::remove-scratch", "return").unwrap();
    let outcome = guardian.restore_database(&record).unwrap();

    assert_eq!(site.titles(), ["Sistema de riego"]);
    assert_eq!(outcome.safety_copy, Some(safety_copy_path(&site.db_path())));
    // The scratch directory still goes away when it's dropped.
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
    scenario.teardown();
}
