// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StateError;
use crate::video::VIDEO_EXTENSION;

/// Finished videos per directory, each directory scanned at most once.
///
/// Files downloaded during the run are added with [`DirectoryIndex::record`],
/// so the cache stays in step with the disk without rescanning.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    listings: HashMap<PathBuf, Vec<String>>,
}

impl DirectoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn listing(&mut self, directory: &Path) -> Result<&mut Vec<String>, StateError> {
        if !self.listings.contains_key(directory) {
            let files = scan_directory(directory)?;
            debug!(directory = %directory.display(), count = files.len(), "scanned directory");
            self.listings.insert(directory.to_path_buf(), files);
        }

        Ok(self.listings.entry(directory.to_path_buf()).or_default())
    }

    /// Find the finished file for a video.
    ///
    /// Files are matched on the `[<id>]` marker. Older files were named after
    /// the post instead of the video, so for posts with a single video the
    /// `[<post_id>]` marker is accepted too.
    pub fn find_existing(
        &mut self,
        directory: &Path,
        id: &str,
        post_id: &str,
        single_item: bool,
    ) -> Result<Option<String>, StateError> {
        let id_marker = format!("[{id}]");
        let post_marker = format!("[{post_id}]");

        let found = self.listing(directory)?.iter().find(|filename| {
            filename.contains(&id_marker) || (single_item && filename.contains(&post_marker))
        });

        Ok(found.cloned())
    }

    /// Note a file that was just written to `directory`
    pub fn record(&mut self, directory: &Path, filename: &str) -> Result<(), StateError> {
        let listing = self.listing(directory)?;
        if let Err(position) = listing.binary_search_by(|name| name.as_str().cmp(filename)) {
            listing.insert(position, filename.to_string());
        }
        Ok(())
    }
}

/// Sorted names of finished videos in `directory`; a missing directory is empty
fn scan_directory(directory: &Path) -> Result<Vec<String>, StateError> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(directory).map_err(|e| StateError::ReadDirectoryFailed {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: directory.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(VIDEO_EXTENSION)
        {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push(name.to_string());
        }
    }

    files.sort();
    Ok(files)
}

/// The top-level output directory must already exist
pub fn ensure_output_dir(path: &Path) -> Result<(), StateError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(StateError::DirectoryNotFound(path.to_path_buf()))
    }
}

/// Create a target directory and any missing parents
pub fn ensure_directory(path: &Path) -> Result<(), StateError> {
    std::fs::create_dir_all(path).map_err(|e| StateError::CreateDirectoryFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
