// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::MetadataError;
use crate::http::{HttpClient, HttpRequest};

use super::{EmbedOutcome, MetadataEmbedder, TagSet};

/// Temporary location of a video's preview image
pub fn preview_path(video_path: &Path) -> PathBuf {
    let mut name = video_path.as_os_str().to_owned();
    name.push(".preview.jpg");
    PathBuf::from(name)
}

/// Download a preview image next to the video.
///
/// Failures are logged and yield `None`; a missing cover never blocks tagging.
pub async fn fetch_preview<C: HttpClient>(
    client: &C,
    url: &str,
    video_path: &Path,
) -> Option<PathBuf> {
    let response = match client.send(HttpRequest::get(url)).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            warn!(url, status = response.status, "unable to download preview");
            return None;
        }
        Err(e) => {
            warn!(url, reason = %e, "unable to download preview");
            return None;
        }
    };

    let path = preview_path(video_path);
    match tokio::fs::write(&path, &response.body).await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(path = %path.display(), reason = %e, "unable to save preview");
            None
        }
    }
}

/// Embed tags, using the preview image as cover when one is available.
///
/// The downloaded preview is removed again whatever the outcome.
pub async fn apply_metadata<C, E>(
    client: &C,
    embedder: &E,
    video_path: &Path,
    mut tags: TagSet,
    preview_url: Option<&str>,
) -> Result<EmbedOutcome, MetadataError>
where
    C: HttpClient,
    E: MetadataEmbedder + ?Sized,
{
    if let Some(url) = preview_url {
        tags.cover = fetch_preview(client, url, video_path).await;
    }

    let result = embedder.embed(video_path, &tags).await;

    if let Some(cover) = &tags.cover
        && let Err(e) = tokio::fs::remove_file(cover).await
    {
        warn!(path = %cover.display(), reason = %e, "unable to remove preview");
    }

    result
}
