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

//! MySQL backups and restores, run against stand-in shell scripts for
//! `mysqldump` and `mysql`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indoc::formatdoc;
use pretty_assertions::assert_eq;

use oasis_guardian::container::{entry_names, read_manifest};
use oasis_guardian::test_fixtures::ScratchSite;
use oasis_guardian::*;

fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_owned()
}

/// A site whose database is "MySQL", served by the given dump and client scripts.
fn mysql_guardian(site: &ScratchSite, dump: &str, client: &str) -> Guardian {
    let mut settings = MysqlSettings::new("db.internal", "oasis", "s3cret", "oasis_prod");
    settings.dump_command = write_script(&site.path().join("fake-mysqldump"), dump);
    settings.client_command = write_script(&site.path().join("fake-mysql"), client);
    Guardian::new(&site.backup_dir(), Database::Mysql(settings), site.key())
        .with_media_root(Some(site.media_root()))
}

const GOOD_DUMP: &str = r#"echo "-- args: $*"
echo "-- password: $MYSQL_PWD"
echo "CREATE TABLE proyectos (id INT);"
"#;

#[test]
fn dump_goes_into_the_container() {
    let site = ScratchSite::new();
    let guardian = mysql_guardian(&site, GOOD_DUMP, "cat > /dev/null\n");
    let artifact = guardian.create_db_only_backup(false).unwrap();

    let names = entry_names(&artifact.path).unwrap();
    assert!(names[0].starts_with("oasis_db_") && names[0].ends_with(".sql"), "{names:?}");
    let manifest = read_manifest(&artifact.path).unwrap().unwrap();
    assert!(manifest.contains("Engine: mysql\n"));
    assert!(manifest.contains("Database: mysql oasis@db.internal:3306/oasis_prod\n"));
    assert!(!manifest.contains("s3cret"));
}

#[test]
fn dump_is_consistent_and_password_stays_off_the_command_line() {
    let site = ScratchSite::new();
    let guardian = mysql_guardian(&site, GOOD_DUMP, "cat > /dev/null\n");
    let snapshot = guardian.snapshot_database().unwrap();
    let dump = fs::read_to_string(&snapshot).unwrap();
    assert!(dump.contains("--single-transaction"), "{dump}");
    assert!(dump.contains("--host=db.internal --port=3306 --user=oasis"), "{dump}");
    assert!(dump.contains("oasis_prod"), "{dump}");
    assert!(dump.contains("-- password: s3cret"), "{dump}");
    assert!(!dump.lines().next().unwrap().contains("s3cret"));
}

#[test]
fn failed_dump_leaves_no_partial_output() {
    let site = ScratchSite::new();
    let guardian = mysql_guardian(
        &site,
        "echo 'CREATE TABLE half'\necho 'Access denied' >&2\nexit 2\n",
        "cat > /dev/null\n",
    );
    let err = guardian.create_full_backup(false).unwrap_err();
    match &err {
        Error::ToolFailed { status, stderr, .. } => {
            assert_eq!(status, "exit code 2");
            assert_eq!(stderr, "Access denied");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::ExternalTool);
    assert_eq!(site.backup_dir_names(), Vec::<String>::new());
}

#[test]
fn slow_dump_times_out() {
    let site = ScratchSite::new();
    let guardian = mysql_guardian(&site, "exec sleep 10\n", "cat > /dev/null\n")
        .with_tool_timeout(Duration::from_millis(300));
    let err = guardian.create_db_only_backup(false).unwrap_err();
    assert!(matches!(err, Error::ToolTimeout { .. }), "{err:?}");
    assert_eq!(site.backup_dir_names(), Vec::<String>::new());
}

#[test]
fn restore_pipes_the_dump_to_the_client() {
    let site = ScratchSite::new();
    let received = site.path().join("received.sql");
    let client = formatdoc! {r#"
        echo "-- args: $*" > "{received}"
        cat >> "{received}"
        "#,
        received = received.display(),
    };
    let guardian = mysql_guardian(&site, GOOD_DUMP, &client);
    let catalog = site.catalog();
    let record = admin::create_backup(
        &guardian,
        &catalog,
        BackupContent::Full,
        true,
        BackupOrigin::Manual,
        &Actor::new("admin"),
        None,
    )
    .unwrap();

    let outcome = guardian.restore_database(&record).unwrap();

    assert_eq!(outcome.safety_copy, None);
    let received = fs::read_to_string(&received).unwrap();
    assert!(received.starts_with("-- args: --host=db.internal --port=3306 --user=oasis oasis_prod\n"));
    assert!(received.contains("CREATE TABLE proyectos (id INT);"), "{received}");
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}

#[test]
fn failed_client_is_reported() {
    let site = ScratchSite::new();
    let guardian = mysql_guardian(&site, GOOD_DUMP, "cat > /dev/null\necho 'ERROR 1064' >&2\nexit 1\n");
    let record = admin::create_backup(
        &guardian,
        &site.catalog(),
        BackupContent::Database,
        false,
        BackupOrigin::Manual,
        &Actor::new("admin"),
        None,
    )
    .unwrap();
    let err = guardian.restore_database(&record).unwrap_err();
    assert!(matches!(err, Error::ToolFailed { .. }), "{err:?}");
    assert_eq!(site.stale_temp_names(), Vec::<String>::new());
}
