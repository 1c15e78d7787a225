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

//! Standalone archives of uploaded media.

use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::container;
use crate::errors::io_error;
use crate::misc::{now_local, timestamp};
use crate::*;

/// Entry written instead of media when there's no media directory.
pub const NO_MEDIA_NOTE_NAME: &str = "README.txt";

const NO_MEDIA_NOTE: &str = "No media directory was configured or found.\n";

impl Guardian {
    /// Write every file under the media root into a new
    /// `oasis_media_<stamp>.zip`, with entry names relative to the root.
    ///
    /// A missing or unset media root gives a container holding only a note.
    pub fn archive_media(&self) -> Result<PathBuf> {
        self.create_media_backup(false).map(|artifact| artifact.path)
    }

    /// Archive the media, optionally encrypt it, and hash the result.
    #[instrument(skip(self))]
    pub fn create_media_backup(&self, encrypt: bool) -> Result<Artifact> {
        let stamp = timestamp(now_local());
        let temp = self.new_temp_file(Stage::Archive)?;
        let file = temp
            .as_file()
            .try_clone()
            .map_err(io_error(Stage::Archive, temp.path()))?;
        let mut zip = container::create(file);
        let files = match self.existing_media_root() {
            Some(root) => {
                container::add_tree(&mut zip, temp.path(), root, None, Some(self.backup_dir()))?
            }
            None => {
                container::add_text(&mut zip, temp.path(), NO_MEDIA_NOTE_NAME, NO_MEDIA_NOTE)?;
                0
            }
        };
        container::finish(zip, temp.path())?
            .flush()
            .map_err(io_error(Stage::Archive, temp.path()))?;
        debug!(files, "Media container written");
        self.seal(temp, "oasis_media", &stamp, encrypt, BackupContent::Media)
    }
}
