// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::http::{HttpClient, HttpRequest};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Suffix marking an in-flight download
pub const PARTIAL_SUFFIX: &str = ".part";

/// Path of the in-flight file for a final destination
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// How a download request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The final file already existed; nothing was fetched
    AlreadyPresent,
    /// A leftover partial file was already complete and was renamed
    CompletedPartial { bytes: u64 },
    /// Bytes were transferred, possibly continuing an earlier partial
    Downloaded { bytes: u64, resumed_from: u64 },
}

/// Decide where a new transfer starts, cleaning up unusable partial files
async fn resume_offset<C: HttpClient>(
    client: &C,
    url: &str,
    path: &Path,
    partial: &Path,
) -> Result<Option<u64>, DownloadError> {
    let Ok(metadata) = fs::metadata(partial).await else {
        return Ok(Some(0));
    };
    let local_size = metadata.len();

    match client.content_length(url).await {
        Ok(Some(remote_size)) if local_size > remote_size => {
            warn!(
                path = %partial.display(),
                local_size,
                remote_size,
                "partial file larger than remote, removing"
            );
            remove(partial).await?;
            Ok(Some(0))
        }
        Ok(Some(remote_size)) if local_size == remote_size => {
            debug!(path = %partial.display(), "partial file already complete");
            rename(partial, path).await?;
            Ok(None)
        }
        Ok(Some(_)) => Ok(Some(local_size)),
        // The partial is truncated once the server answers, not before
        Ok(None) | Err(_) => {
            debug!(
                path = %partial.display(),
                "remote size unknown, restarting download"
            );
            Ok(Some(0))
        }
    }
}

async fn remove(path: &Path) -> Result<(), DownloadError> {
    fs::remove_file(path)
        .await
        .map_err(|e| DownloadError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn rename(from: &Path, to: &Path) -> Result<(), DownloadError> {
    fs::rename(from, to)
        .await
        .map_err(|e| DownloadError::RenameFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        })
}

/// Download `url` to `path`, resuming a previous partial download if possible.
///
/// The body is streamed into `<path>.part` and only renamed to `path` once the
/// transfer finished and its size checked out. On failure the partial file is
/// left in place so the next run can continue it.
pub async fn download_file<C: HttpClient>(
    client: &C,
    url: &str,
    path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<FetchOutcome, DownloadError> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if fs::metadata(path).await.is_ok() {
        return Ok(FetchOutcome::AlreadyPresent);
    }

    let partial = partial_path(path);

    let Some(mut resume_from) = resume_offset(client, url, path, &partial).await? else {
        reporter.report(ProgressEvent::PartialRecovered {
            filename: filename.clone(),
        });
        let bytes = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        return Ok(FetchOutcome::CompletedPartial { bytes });
    };

    let mut request = HttpRequest::get(url);
    if resume_from > 0 {
        request = request.range_start(resume_from);
    }

    let response = client
        .send_streaming(request)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !(200..300).contains(&response.status) {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    // Servers that ignore the range header send the whole file again
    if resume_from > 0 && response.status != 206 {
        debug!(url, "range request not honoured, restarting");
        resume_from = 0;
    }
    let append = resume_from > 0;

    let expected_size = response.content_length.map(|len| resume_from + len);

    reporter.report(ProgressEvent::DownloadStarting {
        filename: filename.clone(),
        resume_from,
        content_length: expected_size,
    });

    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    let mut file = options
        .open(&partial)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial.clone(),
            source: e,
        })?;

    let mut bytes_downloaded = resume_from;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                // Keep what arrived so far for the next resume
                let _ = file.flush().await;
                return Err(DownloadError::StreamFailed {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial.clone(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            filename: filename.clone(),
            bytes_downloaded,
            total_bytes: expected_size,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial.clone(),
            source: e,
        })?;
    drop(file);

    let actual_size = fs::metadata(&partial)
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial.clone(),
            source: e,
        })?
        .len();

    if let Some(expected) = expected_size
        && actual_size != expected
    {
        return Err(DownloadError::SizeMismatch {
            path: partial,
            expected,
            actual: actual_size,
        });
    }

    rename(&partial, path).await?;

    info!(path = %path.display(), bytes = actual_size, resumed_from = resume_from, "download complete");

    reporter.report(ProgressEvent::DownloadCompleted {
        filename,
        bytes_downloaded: actual_size,
    });

    Ok(FetchOutcome::Downloaded {
        bytes: actual_size,
        resumed_from: resume_from,
    })
}
