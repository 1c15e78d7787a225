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

//! Run the oasis-guardian CLI as a subprocess and test it.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use oasis_guardian::test_fixtures::{ScratchSite, TEST_ADMIN, TEST_ADMIN_PASSWORD};
use oasis_guardian::{Catalog, RecordStore};

fn run_guardian(site: &ScratchSite) -> Command {
    let mut command = Command::cargo_bin("oasis-guardian").expect("locate oasis-guardian binary");
    command
        .arg("--config")
        .arg(site.write_config())
        .env("OASIS_SECRET_KEY", "cli-secret")
        .env_remove("OASIS_ADMIN_PASSWORD");
    command
}

#[test]
fn no_args() {
    Command::cargo_bin("oasis-guardian")
        .unwrap()
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn help() {
    Command::cargo_bin("oasis-guardian")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    Command::cargo_bin("oasis-guardian")
        .unwrap()
        .current_dir(tmp.path())
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error during configuration"));
}

#[test]
fn create_list_verify_delete() {
    let site = ScratchSite::new();
    run_guardian(&site)
        .args(["create", "--database-only", "--encrypt", "--notes", "from the cli"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Created backup 1 oasis_db_"));

    let records = Catalog::open(&site.backup_dir()).list().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].encrypted);
    assert_eq!(records[0].notes, "from the cli");

    run_guardian(&site)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(records[0].filename.as_str()))
        .stdout(predicate::str::contains("manual"))
        .stdout(predicate::str::contains("enc"));

    run_guardian(&site)
        .args(["verify", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is intact"));

    run_guardian(&site)
        .args(["delete", "1"])
        .assert()
        .success()
        .stdout("Deleted backup 1\n");
    assert!(!records[0].filepath.exists());

    run_guardian(&site)
        .args(["verify", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No backup record with id 1"));
}

#[test]
fn verify_of_tampered_backup_fails() {
    let site = ScratchSite::new();
    run_guardian(&site).arg("create").assert().success();
    let record = Catalog::open(&site.backup_dir()).require(1).unwrap();
    let mut bytes = fs::read(&record.filepath).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    fs::write(&record.filepath, bytes).unwrap();

    run_guardian(&site)
        .args(["verify", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("does NOT match"));
}

#[test]
fn download_to_file() {
    let site = ScratchSite::new();
    run_guardian(&site).args(["create", "--media-only"]).assert().success();
    let record = Catalog::open(&site.backup_dir()).require(1).unwrap();
    let out = TempDir::new().unwrap();
    let dest = out.child("copy.zip");

    run_guardian(&site)
        .args(["download", "1"])
        .arg(dest.path())
        .assert()
        .success();
    dest.assert(predicate::path::eq_file(&record.filepath));

    // Refuses to overwrite an existing file.
    run_guardian(&site)
        .args(["download", "1"])
        .arg(dest.path())
        .assert()
        .code(1);
}

#[test]
fn restore_needs_the_right_password() {
    let site = ScratchSite::new();
    run_guardian(&site)
        .args(["create", "--database-only"])
        .assert()
        .success();
    site.insert_row("Agregado despues");

    run_guardian(&site)
        .args(["restore", "1", "--user", TEST_ADMIN, "--password", "guess"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("re-authentication"));
    assert_eq!(site.titles().len(), 2);

    run_guardian(&site)
        .args(["restore", "1", "--user", TEST_ADMIN])
        .env("OASIS_ADMIN_PASSWORD", TEST_ADMIN_PASSWORD)
        .assert()
        .success()
        .stdout(predicate::str::contains("Previous database saved as"))
        .stdout(predicate::str::contains("Restart the server"));
    assert_eq!(site.titles(), ["Sistema de riego"]);
}

#[test]
fn create_without_secret_is_a_usage_error() {
    let site = ScratchSite::new();
    run_guardian(&site)
        .env_remove("OASIS_SECRET_KEY")
        .arg("create")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OASIS_SECRET_KEY"));
}

#[test]
fn cleanup_and_stats() {
    let site = ScratchSite::new();
    for _ in 0..3 {
        run_guardian(&site)
            .args(["create", "--database-only", "--automatic"])
            .assert()
            .success();
    }
    run_guardian(&site)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 backups"));

    run_guardian(&site)
        .args(["cleanup", "--max-count", "1"])
        .assert()
        .success()
        .stdout("Removed 2 old backups\n");
    assert_eq!(Catalog::open(&site.backup_dir()).list().unwrap().len(), 1);
}

#[test]
fn media_archive() {
    let site = ScratchSite::new();
    run_guardian(&site)
        .arg("media")
        .assert()
        .success()
        .stdout(predicate::str::contains("oasis_media_"));
    assert!(Catalog::open(&site.backup_dir()).list().unwrap().is_empty());
}
