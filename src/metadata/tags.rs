// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{Picture, PictureType};
use lofty::tag::{Accessor, Tag, TagExt};
use tracing::debug;

use crate::error::MetadataError;

use super::{EmbedOutcome, MetadataEmbedder, TagSet};

/// Embeds tags in place using `lofty`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyEmbedder;

impl LoftyEmbedder {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `tag` already carries the requested title, artist, comment and
/// cover image
pub fn tags_match(tag: &Tag, tags: &TagSet, cover: Option<&[u8]>) -> bool {
    if tag.title().as_deref() != Some(tags.title.as_str())
        || tag.artist().as_deref() != Some(tags.artist.as_str())
    {
        return false;
    }

    if let Some(comment) = &tags.comment
        && tag.comment().as_deref() != Some(comment.as_str())
    {
        return false;
    }

    match cover {
        Some(data) => matches!(tag.pictures(), [picture] if picture.data() == data),
        None => true,
    }
}

fn embed_blocking(path: &Path, tags: &TagSet) -> Result<EmbedOutcome, MetadataError> {
    let cover = tags
        .cover
        .as_deref()
        .map(|cover_path| {
            std::fs::read(cover_path).map_err(|e| MetadataError::CoverReadFailed {
                path: cover_path.to_path_buf(),
                source: e,
            })
        })
        .transpose()?;

    let mut tagged_file = lofty::read_from_path(path).map_err(|e| MetadataError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tag_type = tagged_file.primary_tag_type();
    let mut tag = tagged_file
        .remove(tag_type)
        .unwrap_or_else(|| Tag::new(tag_type));

    if tags_match(&tag, tags, cover.as_deref()) {
        debug!(path = %path.display(), "tags already up to date");
        return Ok(EmbedOutcome::Unchanged);
    }

    tag.set_title(tags.title.clone());
    tag.set_artist(tags.artist.clone());
    if let Some(comment) = &tags.comment {
        tag.set_comment(comment.clone());
    }

    if let (Some(data), Some(cover_path)) = (cover, tags.cover.as_deref()) {
        let mut picture =
            Picture::from_reader(&mut data.as_slice()).map_err(|e| MetadataError::InvalidCover {
                path: cover_path.to_path_buf(),
                source: e,
            })?;
        picture.set_pic_type(PictureType::CoverFront);

        while !tag.pictures().is_empty() {
            tag.remove_picture(0);
        }
        tag.push_picture(picture);
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| MetadataError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!(path = %path.display(), "tags written");
    Ok(EmbedOutcome::Written)
}

#[async_trait]
impl MetadataEmbedder for LoftyEmbedder {
    async fn embed(&self, path: &Path, tags: &TagSet) -> Result<EmbedOutcome, MetadataError> {
        let path = path.to_path_buf();
        let tags = tags.clone();

        tokio::task::spawn_blocking(move || embed_blocking(&path, &tags)).await?
    }
}
