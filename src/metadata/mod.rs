mod cover;
mod tags;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::MetadataError;

pub use cover::{apply_metadata, fetch_preview, preview_path};
pub use tags::{LoftyEmbedder, tags_match};

/// Tags written into a finished video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    pub title: String,
    /// The channel name
    pub artist: String,
    /// Link back to the post
    pub comment: Option<String>,
    /// Image file to embed as front cover
    pub cover: Option<PathBuf>,
}

/// Whether tags had to be rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    Written,
    /// Every tag already had the requested value
    Unchanged,
}

/// Writes tags into media files
#[async_trait]
pub trait MetadataEmbedder: Send + Sync {
    async fn embed(&self, path: &Path, tags: &TagSet) -> Result<EmbedOutcome, MetadataError>;
}
