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

//! Retention cleanup.

use std::fs;

use pretty_assertions::assert_eq;
use rstest::rstest;
use time::{Duration, OffsetDateTime};

use oasis_guardian::test_fixtures::ScratchSite;
use oasis_guardian::*;

/// Store records made `ages_hours` ago, each with a small artifact file.
fn populate(site: &ScratchSite, ages_hours: &[i64]) -> Vec<BackupRecord> {
    let catalog = site.catalog();
    let now = OffsetDateTime::now_utc();
    ages_hours
        .iter()
        .map(|&age| {
            let filename = format!("oasis_db_age{age}.zip");
            let filepath = site.backup_dir().join(&filename);
            fs::write(&filepath, b"not really a zip").unwrap();
            catalog
                .insert(NewBackupRecord {
                    filename,
                    filepath,
                    size_bytes: 16,
                    kind: BackupOrigin::Automatic,
                    content: BackupContent::Database,
                    hash_sha256: String::new(),
                    encrypted: false,
                    created_at: now - Duration::hours(age),
                    created_by: None,
                    notes: String::new(),
                })
                .unwrap()
        })
        .collect()
}

fn remaining_names(site: &ScratchSite) -> Vec<String> {
    site.catalog()
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.filename)
        .collect()
}

#[rstest]
#[case::age_limit_only(10, 100, 4)]
#[case::count_limit_only(365, 3, 3)]
#[case::both(10, 2, 2)]
#[case::keep_none(365, 0, 0)]
#[case::everything_expired(0, 100, 0)]
#[case::age_limit_before_earliest_date(u32::MAX, 100, 7)]
#[case::age_limit_before_earliest_date_with_count(u32::MAX, 3, 3)]
fn leaves_the_newest_within_both_limits(
    #[case] max_age_days: u32,
    #[case] max_count: usize,
    #[case] expected: usize,
) {
    let site = ScratchSite::new();
    // Distinct ages: 1h, 2d, 5d, 9d, 20d, 40d, 90d.
    let ages = [1, 48, 120, 216, 480, 960, 2160];
    let records = populate(&site, &ages);
    let policy = RetentionPolicy {
        max_age_days,
        max_count,
    };

    let removed = cleanup_old_backups(&site.catalog(), &policy).unwrap();

    assert_eq!(removed, ages.len() - expected);
    let remaining = site.catalog().list().unwrap();
    assert_eq!(remaining.len(), expected);
    // The survivors are always the newest ones.
    let newest: Vec<u64> = records.iter().take(expected).map(|r| r.id).collect();
    let kept: Vec<u64> = remaining.iter().map(|r| r.id).collect();
    assert_eq!(kept, newest);
    for record in &records {
        assert_eq!(
            record.filepath.exists(),
            kept.contains(&record.id),
            "{record:?}"
        );
    }
}

#[test]
fn missing_artifacts_are_still_removed_from_the_catalog() {
    let site = ScratchSite::new();
    let records = populate(&site, &[1, 24 * 60]);
    fs::remove_file(&records[1].filepath).unwrap();

    let removed = cleanup_old_backups(&site.catalog(), &RetentionPolicy::default()).unwrap();

    assert_eq!(removed, 1);
    assert_eq!(remaining_names(&site), ["oasis_db_age1.zip"]);
}

#[test]
fn default_policy_on_real_backups_keeps_recent_ones() {
    let site = ScratchSite::new();
    let guardian = site.guardian();
    let catalog = site.catalog();
    for _ in 0..3 {
        admin::create_backup(
            &guardian,
            &catalog,
            BackupContent::Database,
            false,
            BackupOrigin::Automatic,
            &Actor::new("cron"),
            None,
        )
        .unwrap();
    }
    assert_eq!(
        cleanup_old_backups(&catalog, &RetentionPolicy::default()).unwrap(),
        0
    );
    assert_eq!(catalog.list().unwrap().len(), 3);
}
