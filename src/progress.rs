// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::sync::Arc;

use crate::sync::SyncStats;

/// Why a post or video was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The post is behind a subscription tier we do not have
    NoAccess,
    /// The post has no complete, playable videos
    NoVideos,
    /// No playable URL within the quality ceiling
    NoMedia,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoAccess => "no access",
            SkipReason::NoVideos => "no videos",
            SkipReason::NoMedia => "no media",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted during synchronization for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A channel's post listing is being fetched
    FetchingPosts {
        channel: String,
        days_back: Option<u32>,
    },

    /// A single post is being fetched
    FetchingPost { channel: String, post_id: String },

    /// A channel's listing is complete
    PostsListed { channel: String, count: usize },

    /// A post or video was skipped
    Skipped { name: String, reason: SkipReason },

    /// The video is already on disk
    AlreadyExists { filename: String },

    /// Tags of an existing video are being refreshed
    UpdatingMetadata { filename: String },

    /// A download is starting
    DownloadStarting {
        filename: String,
        /// Bytes already on disk from an earlier attempt
        resume_from: u64,
        /// Expected final size in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        filename: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        filename: String,
        bytes_downloaded: u64,
    },

    /// A leftover partial file turned out to be complete
    PartialRecovered { filename: String },

    /// A download failed
    DownloadFailed { filename: String, error: String },

    /// Sync operation completed
    SyncCompleted { stats: SyncStats },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Collects every event; used by tests to assert on what was reported
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn skips(&self) -> Vec<SkipReason> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Skipped { reason, .. } => Some(reason),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
