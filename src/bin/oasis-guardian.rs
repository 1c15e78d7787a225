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

//! Command-line entry point for OASIS backups.

use std::error::Error as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn, Level};

use oasis_guardian::misc::timestamp;
use oasis_guardian::ui::{self, TraceTimeStyle};
use oasis_guardian::*;

#[derive(Debug, Parser)]
#[command(author, about, version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(long, short, global = true, default_value = "oasis-guardian.json")]
    config: PathBuf,

    /// Secret the backup encryption key is derived from.
    #[arg(long, env = "OASIS_SECRET_KEY", hide_env_values = true, global = true)]
    secret: Option<String>,

    /// Show debug trace on stderr.
    #[arg(long, short = 'D', global = true)]
    debug: bool,

    /// Control timestamps prefixes on stderr.
    #[arg(long, value_enum, global = true, default_value_t = TraceTimeStyle::None)]
    trace_time: TraceTimeStyle,

    /// Append a json formatted log to this file.
    #[arg(long, global = true)]
    log_json: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Back up the database, and unless told otherwise the media too.
    Create {
        /// Only back up the database.
        #[arg(long, conflicts_with = "media_only")]
        database_only: bool,
        /// Only back up the media.
        #[arg(long)]
        media_only: bool,
        /// Encrypt the backup with the key derived from the secret.
        #[arg(long)]
        encrypt: bool,
        /// Record the backup as made by a scheduler rather than by hand.
        #[arg(long)]
        automatic: bool,
        /// Note to store with the backup record.
        #[arg(long)]
        notes: Option<String>,
        /// Administrator making the backup.
        #[arg(long, default_value = "system")]
        user: String,
    },

    /// List backups, newest first.
    List,

    /// Check a backup against its recorded hash.
    Verify { id: u64 },

    /// Copy a backup artifact to a file, or to stdout with `-`.
    Download { id: u64, dest: PathBuf },

    /// Delete a backup and its record.
    Delete { id: u64 },

    /// Replace the live database with the contents of a backup.
    Restore {
        id: u64,
        /// Administrator confirming the restore.
        #[arg(long)]
        user: String,
        /// Password of that administrator.
        #[arg(long, env = "OASIS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Delete backups past the retention limits.
    Cleanup {
        /// Delete backups older than this; defaults to the configured limit.
        #[arg(long)]
        max_age_days: Option<u32>,
        /// Keep at most this many; defaults to the configured limit.
        #[arg(long)]
        max_count: Option<usize>,
    },

    /// Show totals and free disk space.
    Stats,

    /// Write a standalone archive of the media, without recording it.
    Media,
}

enum ExitCode {
    Success = 0,
    Failure = 1,
    Usage = 2,
}

impl std::process::Termination for ExitCode {
    fn report(self) -> std::process::ExitCode {
        (self as u8).into()
    }
}

impl Args {
    /// A Guardian for the configured site, for commands that write backups.
    fn guardian(&self, config: &Config) -> Option<Guardian> {
        let Some(secret) = &self.secret else {
            error!("This command needs --secret or OASIS_SECRET_KEY");
            return None;
        };
        Some(Guardian::from_config(config, derive_key(secret.as_bytes())))
    }
}

impl Command {
    fn run(&self, args: &Args) -> Result<ExitCode> {
        let config = Config::load(&args.config)?;
        let store = Catalog::open(&config.backup_dir);
        match self {
            Command::Create {
                database_only,
                media_only,
                encrypt,
                automatic,
                notes,
                user,
            } => {
                let Some(guardian) = args.guardian(&config) else {
                    return Ok(ExitCode::Usage);
                };
                let content = if *database_only {
                    BackupContent::Database
                } else if *media_only {
                    BackupContent::Media
                } else {
                    BackupContent::Full
                };
                let origin = if *automatic {
                    BackupOrigin::Automatic
                } else {
                    BackupOrigin::Manual
                };
                let record = admin::create_backup(
                    &guardian,
                    &store,
                    content,
                    *encrypt,
                    origin,
                    &Actor::new(user),
                    notes.clone(),
                )?;
                println!(
                    "Created backup {} {} ({}, sha256 {})",
                    record.id,
                    record.filename,
                    record.size_display(),
                    record.hash_prefix()
                );
            }
            Command::List => {
                for record in store.list()? {
                    println!(
                        "{:>5}  {}  {:<9}  {:<8}  {:>10}  {}  {}",
                        record.id,
                        timestamp(record.created_at),
                        record.kind,
                        record.content,
                        record.size_display(),
                        if record.encrypted { "enc" } else { "   " },
                        record.filename,
                    );
                }
            }
            Command::Verify { id } => {
                let verification = admin::verify_backup(&store, *id, &operator())?;
                if verification.valid {
                    println!("Backup {id} is intact (sha256 {}...)", verification.hash_prefix);
                } else {
                    println!(
                        "Backup {id} does NOT match its recorded hash (sha256 {}...)",
                        verification.hash_prefix
                    );
                    return Ok(ExitCode::Failure);
                }
            }
            Command::Download { id, dest } => {
                let mut download = admin::download_backup(&store, *id, &operator())?;
                copy_out(&mut download, dest)?;
                info!(filename = download.filename, ?dest, "Backup downloaded");
            }
            Command::Delete { id } => {
                if admin::delete_backup(&store, *id, &operator())? {
                    println!("Deleted backup {id}");
                } else {
                    println!("Deleted record {id}; its file was already gone");
                }
            }
            Command::Restore { id, user, password } => {
                let Some(guardian) = args.guardian(&config) else {
                    return Ok(ExitCode::Usage);
                };
                let admins = ConfiguredAdmins::from_config(&config);
                let proof = Reauthenticated::confirm(&admins, user, password)?;
                let outcome = admin::restore_backup(&guardian, &store, *id, &proof)?;
                if let Some(safety_copy) = &outcome.safety_copy {
                    println!("Previous database saved as {}", safety_copy.display());
                }
                println!("{}", outcome.message);
            }
            Command::Cleanup {
                max_age_days,
                max_count,
            } => {
                let policy = RetentionPolicy {
                    max_age_days: max_age_days.unwrap_or(config.retention.max_age_days),
                    max_count: max_count.unwrap_or(config.retention.max_count),
                };
                let removed = cleanup_old_backups(&store, &policy)?;
                println!("Removed {removed} old backups");
            }
            Command::Stats => {
                print!("{}", backup_stats(&store, &config.backup_dir)?);
            }
            Command::Media => {
                let Some(guardian) = args.guardian(&config) else {
                    return Ok(ExitCode::Usage);
                };
                let path = guardian.archive_media()?;
                println!("Media archived to {}", path.display());
            }
        }
        Ok(ExitCode::Success)
    }
}

/// The user named in logs for commands that don't ask for one.
fn operator() -> Actor {
    Actor::new(&whoami::username())
}

fn copy_out(download: &mut Download, dest: &Path) -> Result<()> {
    let to_error = |source: io::Error| Error::Io {
        stage: Stage::Download,
        path: dest.to_owned(),
        source,
    };
    if dest == Path::new("-") {
        let mut stdout = io::stdout().lock();
        io::copy(&mut download.file, &mut stdout).map_err(to_error)?;
        stdout.flush().map_err(to_error)
    } else {
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .map_err(to_error)?;
        io::copy(&mut download.file, &mut out).map_err(to_error)?;
        out.flush().map_err(to_error)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let start_time = Instant::now();
    let trace_level = if args.debug {
        Level::TRACE
    } else {
        Level::INFO
    };
    let _flush_guard = match ui::enable_tracing(args.trace_time, trace_level, args.log_json.as_deref())
    {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to open JSON log {:?}: {err}", args.log_json);
            return ExitCode::Usage;
        }
    };
    let result = args.command.run(&args);
    debug!(elapsed = ?start_time.elapsed());
    match result {
        Err(err) => {
            error!(kind = %err.kind(), "{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::Failure
        }
        Ok(exit_code) => exit_code,
    }
}

#[test]
fn verify_clap() {
    use clap::CommandFactory;
    Args::command().debug_assert()
}
