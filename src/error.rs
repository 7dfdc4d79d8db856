// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Failure below the HTTP status level (connection, TLS, timeout, broken body)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when talking to the Boosty API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Not authorized to access {url} (access token expired or invalid)")]
    Unauthorized { url: String },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("API error from {url}: {code} ({description})")]
    Remote {
        url: String,
        code: String,
        description: String,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed post {post_id}: {reason}")]
    MalformedRecord { post_id: String, reason: String },

    #[error("Invalid Boosty URL: {0}")]
    InvalidLink(String),
}

impl ApiError {
    /// Whether the remote rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Errors that can occur while loading or refreshing the auth session
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read cookies file {path}: {source}")]
    CookieFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cookies file {path}: {source}")]
    CookieFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Required cookie '{name}' not found in {path}")]
    MissingCookie { name: String, path: PathBuf },

    #[error("Unable to parse auth cookie: {0}")]
    InvalidAuthCookie(#[source] serde_json::Error),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("No client id available for token refresh")]
    NoClientId,

    #[error("Invalid token refresh response: {0}")]
    InvalidTokenResponse(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] ApiError),
}

/// Errors that can occur during video downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to open file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Incomplete download {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Errors that can occur while embedding tags into media files
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read tags from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("Failed to write tags to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("Failed to read cover image {path}: {source}")]
    CoverReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cover image {path} is not a usable picture: {source}")]
    InvalidCover {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("Metadata task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Errors that can occur when scanning or preparing output directories
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Output directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the single-instance lock
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another instance is running (lock: {0})")]
    AlreadyHeld(PathBuf),

    #[error("Unable to acquire lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from library-refresh and email notifiers
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not resolve {service} library '{name}'")]
    Unresolved { service: &'static str, name: String },

    #[error("Failed to run {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Top-level errors for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
