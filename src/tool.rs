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

//! Run external database tools with a deadline.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run `command` to completion, with the given stdin and stdout.
///
/// Stderr is captured for the error message. A non-zero exit is
/// [Error::ToolFailed]; running past `timeout` kills the child and is
/// [Error::ToolTimeout].
pub(crate) fn run_tool(
    mut command: Command,
    stdin: Stdio,
    stdout: Stdio,
    timeout: Duration,
) -> Result<()> {
    let tool = command.get_program().to_string_lossy().into_owned();
    debug!(%tool, ?timeout, "Run external tool");
    let mut child = command
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::ToolSpawn {
            tool: tool.clone(),
            source,
        })?;
    // Drain stderr on another thread so a chatty tool can't block on a full pipe.
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).trim().to_owned()
        })
    });
    let start = Instant::now();
    let status: ExitStatus = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                warn!(%tool, ?timeout, "External tool timed out; killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::ToolTimeout { tool, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(Error::ToolSpawn { tool, source });
            }
        }
    };
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if status.success() {
        debug!(%tool, elapsed = ?start.elapsed(), "External tool finished");
        Ok(())
    } else {
        let status = match status.code() {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_owned(),
        };
        Err(Error::ToolFailed {
            tool,
            status,
            stderr,
        })
    }
}
