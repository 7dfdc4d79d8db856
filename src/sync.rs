// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ContentRecord, MediaItem, Target, parse_target};
use crate::error::SyncError;
use crate::http::HttpClient;
use crate::metadata::{EmbedOutcome, MetadataEmbedder, TagSet, apply_metadata};
use crate::progress::{ProgressEvent, SharedProgressReporter, SkipReason};
use crate::state::{DirectoryIndex, ensure_directory};
use crate::video::{
    FetchOutcome, Quality, download_file, generate_dirname, generate_filename, generate_name,
    local_date, select_url,
};

/// Options for channel synchronization
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Root of the media library; must exist
    pub output_dir: PathBuf,
    /// Best quality to download (None = best available)
    pub max_quality: Option<Quality>,
    /// Only look at posts from the last N days
    pub days_back: Option<u32>,
    /// Group videos into `Season <year>` directories
    pub use_season_dir: bool,
    /// Group videos into one directory per channel
    pub use_channel_dir: bool,
    /// Refresh tags of existing files instead of downloading
    pub update_metadata: bool,
}

impl SyncOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_quality: None,
            days_back: None,
            use_season_dir: true,
            use_channel_dir: true,
            update_metadata: false,
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Valid videos without a local file and with a playable variant
    pub new: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub existing: usize,
    pub metadata_updated: usize,
    pub skipped_no_access: usize,
    pub skipped_no_videos: usize,
    pub skipped_no_media: usize,
}

/// Result of a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Filenames downloaded during the run, in order
    pub downloaded_files: Vec<String>,
    pub stats: SyncStats,
    /// Details of failed downloads (filename, error message)
    pub failed_items: Vec<(String, String)>,
}

/// Posts of one channel, as printed by the listing mode
#[derive(Debug, Clone, Serialize)]
pub struct ChannelListing {
    pub channel: String,
    pub posts: Vec<ContentRecord>,
}

/// Decides and performs the work for each post, one video at a time.
///
/// Owns the per-run directory cache, so one `Syncer` should be used for the
/// whole run.
pub struct Syncer<'a, C, E: ?Sized> {
    client: &'a C,
    embedder: &'a E,
    options: &'a SyncOptions,
    reporter: SharedProgressReporter,
    index: DirectoryIndex,
    result: SyncResult,
}

impl<'a, C, E> Syncer<'a, C, E>
where
    C: HttpClient,
    E: MetadataEmbedder + ?Sized,
{
    pub fn new(
        client: &'a C,
        embedder: &'a E,
        options: &'a SyncOptions,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            client,
            embedder,
            options,
            reporter,
            index: DirectoryIndex::new(),
            result: SyncResult::default(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        self.options
    }

    pub fn reporter(&self) -> &SharedProgressReporter {
        &self.reporter
    }

    pub fn stats(&self) -> SyncStats {
        self.result.stats
    }

    /// Process a channel listing in remote order.
    ///
    /// The sequence index runs across posts of the same calendar day and
    /// restarts when the day changes. Every valid video advances it, even in
    /// posts we cannot access, so names stay stable when access changes.
    pub async fn sync_records(
        &mut self,
        channel: &str,
        records: &[ContentRecord],
    ) -> Result<Vec<String>, SyncError> {
        let mut downloaded = Vec::new();
        let mut previous_day: Option<NaiveDate> = None;
        let mut counter = 0u32;

        for record in records {
            let day = local_date(record.created_at);
            if previous_day != Some(day) {
                counter = 0;
                previous_day = Some(day);
            }

            downloaded.extend(self.sync_record(channel, record, counter).await?);
            counter += record.valid_media().count() as u32;
        }

        Ok(downloaded)
    }

    /// Process one post; its valid videos get indices `start_index + 1`, ...
    pub async fn sync_record(
        &mut self,
        channel: &str,
        record: &ContentRecord,
        start_index: u32,
    ) -> Result<Vec<String>, SyncError> {
        let date = local_date(record.created_at);
        let post_name = || {
            let title = if record.title.trim().is_empty() {
                &record.id
            } else {
                &record.title
            };
            generate_name(date, 0, title)
        };

        if !record.has_access {
            self.skip(post_name(), SkipReason::NoAccess);
            return Ok(Vec::new());
        }

        let valid: Vec<&MediaItem> = record.valid_media().collect();
        if valid.is_empty() {
            self.skip(post_name(), SkipReason::NoVideos);
            return Ok(Vec::new());
        }

        let single_item = valid.len() == 1;
        let mut downloaded = Vec::new();

        for (item, index) in valid.into_iter().zip(start_index + 1..) {
            if let Some(filename) = self
                .sync_item(channel, record, item, index, single_item)
                .await?
            {
                downloaded.push(filename);
            }
        }

        Ok(downloaded)
    }

    fn skip(&mut self, name: String, reason: SkipReason) {
        debug!(%name, %reason, "skipping");
        let stats = &mut self.result.stats;
        match reason {
            SkipReason::NoAccess => stats.skipped_no_access += 1,
            SkipReason::NoVideos => stats.skipped_no_videos += 1,
            SkipReason::NoMedia => stats.skipped_no_media += 1,
        }
        self.reporter.report(ProgressEvent::Skipped { name, reason });
    }

    async fn sync_item(
        &mut self,
        channel: &str,
        record: &ContentRecord,
        item: &MediaItem,
        index: u32,
        single_item: bool,
    ) -> Result<Option<String>, SyncError> {
        let date = local_date(record.created_at);
        let title = item.display_title(&record.title);
        let directory = generate_dirname(
            &self.options.output_dir,
            channel,
            date,
            self.options.use_channel_dir,
            self.options.use_season_dir,
        );
        let tags = TagSet {
            title: title.to_string(),
            artist: channel.to_string(),
            comment: Some(record.post_url(channel)),
            cover: None,
        };

        let existing = self
            .index
            .find_existing(&directory, &item.id, &record.id, single_item)?;

        if let Some(filename) = existing {
            self.result.stats.existing += 1;

            if !self.options.update_metadata {
                self.reporter
                    .report(ProgressEvent::AlreadyExists { filename });
                return Ok(None);
            }

            self.reporter.report(ProgressEvent::UpdatingMetadata {
                filename: filename.clone(),
            });
            let path = directory.join(&filename);
            match apply_metadata(
                self.client,
                self.embedder,
                &path,
                tags,
                item.preview_url.as_deref(),
            )
            .await
            {
                Ok(EmbedOutcome::Written) => self.result.stats.metadata_updated += 1,
                Ok(EmbedOutcome::Unchanged) => debug!(%filename, "metadata unchanged"),
                Err(e) => warn!(%filename, reason = %e, "metadata update failed"),
            }
            return Ok(None);
        }

        if self.options.update_metadata {
            return Ok(None);
        }

        let Some(url) = select_url(&item.variants, self.options.max_quality) else {
            self.skip(generate_name(date, index, title), SkipReason::NoMedia);
            return Ok(None);
        };

        self.result.stats.new += 1;

        ensure_directory(&directory)?;

        let filename = generate_filename(date, index, title, &item.id);
        let path = directory.join(&filename);

        match download_file(self.client, url, &path, &self.reporter).await {
            Ok(FetchOutcome::Downloaded {
                bytes,
                resumed_from,
            }) => debug!(%filename, bytes, resumed_from, "video stored"),
            Ok(outcome) => debug!(%filename, ?outcome, "video already complete"),
            Err(e) => {
                warn!(%filename, reason = %e, "download failed");
                self.reporter.report(ProgressEvent::DownloadFailed {
                    filename: filename.clone(),
                    error: e.to_string(),
                });
                self.result.stats.failed += 1;
                self.result.failed_items.push((filename, e.to_string()));
                return Ok(None);
            }
        }

        if let Err(e) = apply_metadata(
            self.client,
            self.embedder,
            &path,
            tags,
            item.preview_url.as_deref(),
        )
        .await
        {
            warn!(%filename, reason = %e, "embedding metadata failed");
        }

        self.index.record(&directory, &filename)?;
        self.result.stats.downloaded += 1;
        self.result.downloaded_files.push(filename.clone());
        info!(%filename, "downloaded");

        Ok(Some(filename))
    }

    /// Finish the run and report the final counters
    pub fn finish(self) -> SyncResult {
        self.reporter.report(ProgressEvent::SyncCompleted {
            stats: self.result.stats,
        });
        self.result
    }
}

/// List and process every post of a channel
pub async fn sync_channel<C, E>(
    api: &mut ApiClient<'_, C>,
    syncer: &mut Syncer<'_, C, E>,
    channel: &str,
    now: DateTime<Utc>,
) -> Result<Vec<String>, SyncError>
where
    C: HttpClient,
    E: MetadataEmbedder + ?Sized,
{
    let days_back = syncer.options().days_back;
    syncer.reporter().report(ProgressEvent::FetchingPosts {
        channel: channel.to_string(),
        days_back,
    });

    let records = api.list_posts(channel, days_back, now).await?;

    syncer.reporter().report(ProgressEvent::PostsListed {
        channel: channel.to_string(),
        count: records.len(),
    });

    syncer.sync_records(channel, &records).await
}

/// Fetch and process a single post; its videos are numbered from 01
pub async fn sync_post<C, E>(
    api: &mut ApiClient<'_, C>,
    syncer: &mut Syncer<'_, C, E>,
    channel: &str,
    post_id: &str,
) -> Result<Vec<String>, SyncError>
where
    C: HttpClient,
    E: MetadataEmbedder + ?Sized,
{
    syncer.reporter().report(ProgressEvent::FetchingPost {
        channel: channel.to_string(),
        post_id: post_id.to_string(),
    });

    let record = api.get_post(channel, post_id).await?;
    syncer.sync_record(channel, &record, 0).await
}

/// Process channel names and post links in the order given
pub async fn sync_links<C, E>(
    api: &mut ApiClient<'_, C>,
    syncer: &mut Syncer<'_, C, E>,
    links: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<String>, SyncError>
where
    C: HttpClient,
    E: MetadataEmbedder + ?Sized,
{
    let targets = links
        .iter()
        .map(|link| parse_target(link))
        .collect::<Result<Vec<_>, _>>()?;

    let mut downloaded = Vec::new();
    for Target { channel, post_id } in targets {
        let files = match post_id {
            Some(post_id) => sync_post(api, syncer, &channel, &post_id).await?,
            None => sync_channel(api, syncer, &channel, now).await?,
        };
        downloaded.extend(files);
    }

    Ok(downloaded)
}

/// Gather posts for every link without downloading anything
pub async fn collect_listing<C: HttpClient>(
    api: &mut ApiClient<'_, C>,
    links: &[String],
    days_back: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Vec<ChannelListing>, SyncError> {
    let mut listings: Vec<ChannelListing> = Vec::new();

    for link in links {
        let Target { channel, post_id } = parse_target(link)?;
        let posts = match post_id {
            Some(post_id) => vec![api.get_post(&channel, &post_id).await?],
            None => api.list_posts(&channel, days_back, now).await?,
        };

        match listings.iter_mut().find(|listing| listing.channel == channel) {
            Some(listing) => listing.posts.extend(posts),
            None => listings.push(ChannelListing { channel, posts }),
        }
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_post;
    use crate::progress::{NoopReporter, RecordingReporter};
    use crate::testing::{FakeHttpClient, RecordingEmbedder, Reply};
    use crate::video::partial_path;
    use serde_json::{Value, json};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// 2023-11-14 22:13:20 UTC
    const T0: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn video(id: &str) -> Value {
        json!({
            "type": "ok_video",
            "id": id,
            "title": "",
            "complete": true,
            "status": "ok",
            "playerUrls": [
                {"type": "low", "url": format!("https://cdn.test/{id}/low")},
                {"type": "medium", "url": format!("https://cdn.test/{id}/medium")}
            ],
            "preview": format!("https://img.test/{id}.jpg")
        })
    }

    fn pending(id: &str) -> Value {
        json!({"type": "ok_video", "id": id, "complete": false, "status": "ok"})
    }

    fn post(id: &str, created_at: i64, has_access: bool, data: Vec<Value>) -> ContentRecord {
        parse_post(json!({
            "id": id,
            "title": format!("Post {id}"),
            "createdAt": created_at,
            "hasAccess": has_access,
            "data": data
        }))
        .unwrap()
    }

    fn client_for(ids: &[&str]) -> FakeHttpClient {
        ids.iter().fold(FakeHttpClient::new(), |client, id| {
            client
                .with_file(&format!("https://cdn.test/{id}/medium"), id.as_bytes())
                .with_file(&format!("https://img.test/{id}.jpg"), b"jpeg")
        })
    }

    fn expected_path(output: &Path, created_at: i64, index: u32, title: &str, id: &str) -> PathBuf {
        let date = local_date(DateTime::from_timestamp(created_at, 0).unwrap());
        generate_dirname(output, "chan", date, true, true)
            .join(generate_filename(date, index, title, id))
    }

    /// Every file below `root` with its content, sorted by path
    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let content = std::fs::read(&path).unwrap();
                    files.push((path, content));
                }
            }
        }
        files.sort();
        files
    }

    fn video_requests(client: &FakeHttpClient) -> usize {
        client
            .requested_urls()
            .iter()
            .filter(|url| url.starts_with("https://cdn.test/"))
            .count()
    }

    #[tokio::test]
    async fn downloads_new_videos_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v1", "v2"]);
        let embedder = RecordingEmbedder::default();
        let records = vec![post(
            "p1",
            T0,
            true,
            vec![video("v1"), pending("v0"), video("v2")],
        )];

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_records("chan", &records).await.unwrap();
        let result = syncer.finish();

        let first = expected_path(dir.path(), T0, 1, "Post p1", "v1");
        let second = expected_path(dir.path(), T0, 2, "Post p1", "v2");
        assert_eq!(
            downloaded,
            vec![
                first.file_name().unwrap().to_string_lossy().into_owned(),
                second.file_name().unwrap().to_string_lossy().into_owned(),
            ]
        );
        assert_eq!(std::fs::read(&first).unwrap(), b"v1");
        assert_eq!(std::fs::read(&second).unwrap(), b"v2");
        assert_eq!(result.stats.downloaded, 2);
        assert_eq!(result.stats.new, 2);

        let calls = embedder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, first);
        assert_eq!(calls[0].1.title, "Post p1");
        assert_eq!(calls[0].1.artist, "chan");
        assert_eq!(
            calls[0].1.comment.as_deref(),
            Some("https://boosty.to/chan/posts/p1")
        );
        assert_eq!(calls[0].2.as_deref(), Some(&b"jpeg"[..]));
        assert!(!crate::metadata::preview_path(&first).exists());

        // Second run over the same remote state changes nothing
        let before = video_requests(&client);
        let listing_before = snapshot(dir.path());
        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_records("chan", &records).await.unwrap();
        let result = syncer.finish();

        assert!(downloaded.is_empty());
        assert_eq!(result.stats.existing, 2);
        assert_eq!(video_requests(&client), before);
        assert_eq!(embedder.calls().len(), 2);
        assert_eq!(snapshot(dir.path()), listing_before);
    }

    #[tokio::test]
    async fn skips_inaccessible_and_empty_posts() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::default();
        let reporter = Arc::new(RecordingReporter::default());
        let records = vec![
            post("locked", T0, false, vec![video("v1")]),
            post("text", T0 - 60, true, vec![pending("v9")]),
        ];

        let mut syncer = Syncer::new(&client, &embedder, &options, reporter.clone());
        let downloaded = syncer.sync_records("chan", &records).await.unwrap();
        let stats = syncer.finish().stats;

        assert!(downloaded.is_empty());
        assert_eq!(
            reporter.skips(),
            vec![SkipReason::NoAccess, SkipReason::NoVideos]
        );
        assert_eq!(stats.skipped_no_access, 1);
        assert_eq!(stats.skipped_no_videos, 1);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn sequence_runs_across_posts_of_a_day() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["a1", "b1", "b2", "c1", "d1"]);
        let embedder = RecordingEmbedder::default();
        let records = vec![
            post("pa", T0, true, vec![video("a1")]),
            post("locked", T0 - 30, false, vec![video("x1"), video("x2")]),
            post("pb", T0 - 60, true, vec![video("b1"), video("b2")]),
            post("pc", T0 - 2 * DAY, true, vec![video("c1")]),
            post("pd", T0 - 2 * DAY - 60, true, vec![video("d1")]),
        ];

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        syncer.sync_records("chan", &records).await.unwrap();

        assert!(expected_path(dir.path(), T0, 1, "Post pa", "a1").exists());
        // The locked post used indices 2 and 3
        assert!(expected_path(dir.path(), T0 - 60, 4, "Post pb", "b1").exists());
        assert!(expected_path(dir.path(), T0 - 60, 5, "Post pb", "b2").exists());
        assert!(expected_path(dir.path(), T0 - 2 * DAY, 1, "Post pc", "c1").exists());
        assert!(expected_path(dir.path(), T0 - 2 * DAY - 60, 2, "Post pd", "d1").exists());
    }

    #[tokio::test]
    async fn single_post_numbering_starts_at_one() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        syncer.sync_record("chan", &record, 0).await.unwrap();

        assert!(expected_path(dir.path(), T0, 1, "Post p1", "v1").exists());
    }

    #[tokio::test]
    async fn legacy_post_id_file_counts_as_existing() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1")]);

        let legacy = expected_path(dir.path(), T0, 0, "Old name", "p1");
        std::fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        std::fs::write(&legacy, b"old").unwrap();

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();

        assert!(downloaded.is_empty());
        assert_eq!(syncer.stats().existing, 1);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn metadata_mode_refreshes_existing_and_downloads_nothing() {
        let dir = tempdir().unwrap();
        let mut options = SyncOptions::new(dir.path());
        options.update_metadata = true;
        let client = client_for(&["v1", "v2"]);
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1"), video("v2")]);

        let existing = expected_path(dir.path(), T0, 1, "Post p1", "v1");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"v1").unwrap();

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();
        let stats = syncer.finish().stats;

        assert!(downloaded.is_empty());
        assert_eq!(stats.metadata_updated, 1);
        assert_eq!(stats.downloaded, 0);
        assert_eq!(video_requests(&client), 0);
        assert!(!expected_path(dir.path(), T0, 2, "Post p1", "v2").exists());

        let calls = embedder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, existing);
    }

    #[tokio::test]
    async fn unchanged_metadata_is_not_counted() {
        let dir = tempdir().unwrap();
        let mut options = SyncOptions::new(dir.path());
        options.update_metadata = true;
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::unchanged();
        let record = post("p1", T0, true, vec![video("v1")]);

        let existing = expected_path(dir.path(), T0, 1, "Post p1", "v1");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"v1").unwrap();

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        syncer.sync_record("chan", &record, 0).await.unwrap();

        assert_eq!(syncer.stats().metadata_updated, 0);
        assert_eq!(syncer.stats().existing, 1);
    }

    #[tokio::test]
    async fn failed_download_does_not_stop_the_batch() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v2"])
            .with_reply("https://cdn.test/v1/medium", Reply::status(500));
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1"), video("v2")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();
        let result = syncer.finish();

        assert_eq!(downloaded.len(), 1);
        assert_eq!(result.stats.failed, 1);
        assert_eq!(result.stats.downloaded, 1);
        assert_eq!(result.failed_items.len(), 1);
        assert!(expected_path(dir.path(), T0, 2, "Post p1", "v2").exists());
        assert!(!expected_path(dir.path(), T0, 1, "Post p1", "v1").exists());
    }

    #[tokio::test]
    async fn failed_metadata_still_counts_download() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::failing();
        let record = post("p1", T0, true, vec![video("v1")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();

        assert_eq!(downloaded.len(), 1);
        assert_eq!(syncer.stats().downloaded, 1);
    }

    #[tokio::test]
    async fn quality_ceiling_without_match_skips_item() {
        let dir = tempdir().unwrap();
        let mut options = SyncOptions::new(dir.path());
        options.max_quality = Some(Quality::Tiny);
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::default();
        let reporter = Arc::new(RecordingReporter::default());
        let record = post("p1", T0, true, vec![video("v1")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, reporter.clone());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();

        assert!(downloaded.is_empty());
        assert_eq!(reporter.skips(), vec![SkipReason::NoMedia]);
        assert_eq!(syncer.stats().skipped_no_media, 1);
        assert_eq!(syncer.stats().new, 0);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn ceiling_picks_lower_variant() {
        let dir = tempdir().unwrap();
        let mut options = SyncOptions::new(dir.path());
        options.max_quality = Some(Quality::Low);
        let client = FakeHttpClient::new().with_file("https://cdn.test/v1/low", b"small");
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        syncer.sync_record("chan", &record, 0).await.unwrap();

        let path = expected_path(dir.path(), T0, 1, "Post p1", "v1");
        assert_eq!(std::fs::read(path).unwrap(), b"small");
    }

    #[tokio::test]
    async fn flat_layout_without_channel_or_season_dirs() {
        let dir = tempdir().unwrap();
        let mut options = SyncOptions::new(dir.path());
        options.use_channel_dir = false;
        options.use_season_dir = false;
        let client = client_for(&["v1"]);
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1")]);

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        let downloaded = syncer.sync_record("chan", &record, 0).await.unwrap();

        assert!(dir.path().join(&downloaded[0]).exists());
    }

    #[tokio::test]
    async fn leftover_partial_is_resumed() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = FakeHttpClient::new()
            .with_file("https://cdn.test/v1/medium", b"0123456789");
        let embedder = RecordingEmbedder::default();
        let record = post("p1", T0, true, vec![video("v1")]);

        let target = expected_path(dir.path(), T0, 1, "Post p1", "v1");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(partial_path(&target), b"01234").unwrap();

        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());
        syncer.sync_record("chan", &record, 0).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"0123456789");
        let video_request = client
            .requests()
            .into_iter()
            .find(|r| r.url == "https://cdn.test/v1/medium")
            .unwrap();
        assert_eq!(video_request.range_start, Some(5));
    }

    #[tokio::test]
    async fn sync_links_handles_channels_and_posts() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let single = json!({
            "id": "p9", "title": "Single", "createdAt": T0 - 5 * DAY,
            "hasAccess": true, "data": [video("v9")]
        });
        let client = client_for(&["v1", "v9"])
            .with_json(
                "https://api.test/v1/blog/chan/post/?limit=25",
                json!({
                    "data": [{
                        "id": "p1", "title": "Post p1", "createdAt": T0,
                        "hasAccess": true, "data": [video("v1")]
                    }],
                    "extra": {"isLast": true}
                }),
            )
            .with_json("https://api.test/v1/blog/chan/post/p9", single);
        let embedder = RecordingEmbedder::default();
        let mut api = ApiClient::new(&client).with_base_url("https://api.test");
        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());

        let links = vec![
            "chan".to_string(),
            "https://boosty.to/chan/posts/p9?share=1".to_string(),
        ];
        let downloaded = sync_links(&mut api, &mut syncer, &links, Utc::now())
            .await
            .unwrap();

        assert_eq!(downloaded.len(), 2);
        assert!(expected_path(dir.path(), T0, 1, "Post p1", "v1").exists());
        assert!(expected_path(dir.path(), T0 - 5 * DAY, 1, "Single", "v9").exists());
    }

    #[tokio::test]
    async fn invalid_link_aborts_before_any_request() {
        let dir = tempdir().unwrap();
        let options = SyncOptions::new(dir.path());
        let client = FakeHttpClient::new();
        let embedder = RecordingEmbedder::default();
        let mut api = ApiClient::new(&client).with_base_url("https://api.test");
        let mut syncer = Syncer::new(&client, &embedder, &options, NoopReporter::shared());

        let links = vec!["chan".to_string(), "https://example.com/x".to_string()];
        let result = sync_links(&mut api, &mut syncer, &links, Utc::now()).await;

        assert!(matches!(result, Err(SyncError::Api(_))));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn listing_groups_posts_by_channel() {
        let client = FakeHttpClient::new()
            .with_json(
                "https://api.test/v1/blog/chan/post/?limit=25",
                json!({
                    "data": [
                        {"id": "p1", "createdAt": T0},
                        {"id": "locked", "createdAt": T0 - 60, "hasAccess": false, "data": [video("x1")]}
                    ],
                    "extra": {"isLast": true}
                }),
            )
            .with_json(
                "https://api.test/v1/blog/chan/post/p0",
                json!({"id": "p0", "createdAt": T0 - DAY}),
            );
        let mut api = ApiClient::new(&client).with_base_url("https://api.test");

        let links = vec![
            "chan".to_string(),
            "https://boosty.to/chan/posts/p0".to_string(),
        ];
        let listing = collect_listing(&mut api, &links, None, Utc::now())
            .await
            .unwrap();

        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].channel, "chan");
        let ids: Vec<_> = listing[0].posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "locked", "p0"]);
        assert!(!listing[0].posts[1].has_access);
        assert_eq!(listing[0].posts[1].media.len(), 1);

        let rendered = serde_json::to_value(&listing).unwrap();
        assert_eq!(rendered[0]["posts"][0]["id"], "p1");
    }
}
