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

//! Restoring the database from backups.

use std::fs;

use pretty_assertions::assert_eq;
use rstest::rstest;

use oasis_guardian::restore::safety_copy_path;
use oasis_guardian::test_fixtures::ScratchSite;
use oasis_guardian::*;

use super::create;

fn flip_middle_byte(path: &std::path::Path) {
    let mut bytes = fs::read(path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;
    fs::write(path, bytes).unwrap();
}

#[rstest]
#[case::database_plain(BackupContent::Database, false)]
#[case::database_encrypted(BackupContent::Database, true)]
#[case::full_plain(BackupContent::Full, false)]
#[case::full_encrypted(BackupContent::Full, true)]
fn restore_brings_back_the_backed_up_rows(#[case] content: BackupContent, #[case] encrypt: bool) {
    let site = ScratchSite::new();
    let record = create(&site, content, encrypt);
    site.insert_row("Agregado despues");
    assert_eq!(site.titles().len(), 2);

    let outcome = site.guardian().restore_database(&record).unwrap();

    assert_eq!(site.titles(), ["Sistema de riego"]);
    assert_eq!(outcome.filename, record.filename);
    assert!(outcome.message.contains("Restart the server"));
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}

#[test]
fn restore_keeps_a_safety_copy_of_the_previous_database() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, false);
    site.insert_row("Agregado despues");
    let before = fs::read(site.db_path()).unwrap();

    let outcome = site.guardian().restore_database(&record).unwrap();

    let safety_copy = outcome.safety_copy.expect("safety copy made");
    assert_eq!(safety_copy, safety_copy_path(&site.db_path()));
    assert_eq!(fs::read(&safety_copy).unwrap(), before);
    assert_ne!(fs::read(site.db_path()).unwrap(), before);
}

#[test]
fn corrupted_backup_fails_verify_and_restore_leaves_database_alone() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, false);
    let actor = Actor::new("admin");
    assert!(admin::verify_backup(&site.catalog(), record.id, &actor).unwrap().valid);

    flip_middle_byte(&record.filepath);
    site.insert_row("Agregado despues");
    let before = fs::read(site.db_path()).unwrap();

    assert!(!admin::verify_backup(&site.catalog(), record.id, &actor).unwrap().valid);
    let err = site.guardian().restore_database(&record).unwrap_err();
    match &err {
        Error::IntegrityFailure {
            expected, actual, ..
        } => {
            assert_eq!(expected, &record.hash_sha256);
            assert_ne!(actual, expected);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(fs::read(site.db_path()).unwrap(), before);
    assert!(!safety_copy_path(&site.db_path()).exists());
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}

#[test]
fn missing_artifact_is_not_found() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, false);
    fs::remove_file(&record.filepath).unwrap();
    let err = site.guardian().restore_database(&record).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err:?}");
}

#[test]
fn wrong_key_does_not_overwrite_the_database() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, true);
    site.insert_row("Agregado despues");
    let before = fs::read(site.db_path()).unwrap();

    let guardian = Guardian::new(&site.backup_dir(), site.database(), derive_key(b"other"));
    let err = guardian.restore_database(&record).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Format, "{err:?}");
    assert_eq!(fs::read(site.db_path()).unwrap(), before);
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}

#[test]
fn record_claiming_encryption_of_plain_file_is_a_format_error() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, false);
    let mislabelled = BackupRecord {
        encrypted: true,
        ..record
    };
    let err = site.guardian().restore_database(&mislabelled).unwrap_err();
    assert!(matches!(err, Error::NotEncryptedBackup { .. }), "{err:?}");
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}

#[test]
fn media_backup_has_no_database_to_restore() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Media, false);
    let err = site.guardian().restore_database(&record).unwrap_err();
    assert!(matches!(err, Error::MissingDatabaseEntry { .. }), "{err:?}");
    assert_eq!(site.titles(), ["Sistema de riego"]);
}

#[test]
fn restore_into_missing_database_makes_no_safety_copy() {
    let site = ScratchSite::new();
    let record = create(&site, BackupContent::Database, false);
    fs::remove_file(site.db_path()).unwrap();
    let outcome = site.guardian().restore_database(&record).unwrap();
    assert_eq!(outcome.safety_copy, None);
    assert_eq!(site.titles(), ["Sistema de riego"]);
}

#[test]
fn raw_snapshot_restores_without_a_container() {
    let site = ScratchSite::new();
    let snapshot = site.guardian().snapshot_database().unwrap();
    site.insert_row("Agregado despues");
    let record = BackupRecord {
        id: 99,
        filename: snapshot.file_name().unwrap().to_string_lossy().into_owned(),
        filepath: snapshot.clone(),
        size_bytes: fs::metadata(&snapshot).unwrap().len(),
        kind: BackupOrigin::Manual,
        content: BackupContent::Database,
        hash_sha256: integrity::digest(&snapshot).unwrap(),
        encrypted: false,
        created_at: time::OffsetDateTime::now_utc(),
        created_by: None,
        notes: String::new(),
    };
    site.guardian().restore_database(&record).unwrap();
    assert_eq!(site.titles(), ["Sistema de riego"]);
}
