// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::BytesResponse;
use crate::video::QualityVariant;

/// Public site, used to build post links
pub const BOOSTY_SITE_URL: &str = "https://boosty.to";

/// Content item type carrying a hosted video
const VIDEO_ITEM_TYPE: &str = "ok_video";

/// A post as returned by the blog API
#[derive(Debug, Clone, Serialize)]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub has_access: bool,
    /// Video items only; other content blocks are dropped while decoding
    pub media: Vec<MediaItem>,
}

impl ContentRecord {
    /// Videos that finished processing and can be played
    pub fn valid_media(&self) -> impl Iterator<Item = &MediaItem> {
        self.media
            .iter()
            .filter(|item| item.completion == Completion::Ready)
    }

    pub fn post_url(&self, channel: &str) -> String {
        format!("{BOOSTY_SITE_URL}/{channel}/posts/{}", self.id)
    }
}

/// Processing state of a video on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    /// Still uploading or transcoding
    Pending,
    Ready,
    /// Processing finished with an error status
    Unavailable,
}

impl Completion {
    fn from_raw(complete: bool, status: Option<&str>) -> Self {
        match (complete, status) {
            (false, _) => Completion::Pending,
            (true, Some("ok")) => Completion::Ready,
            (true, _) => Completion::Unavailable,
        }
    }
}

/// A single video inside a post
#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub completion: Completion,
    pub variants: Vec<QualityVariant>,
    pub preview_url: Option<String>,
}

impl MediaItem {
    /// The video's own title, else the post title, else "untitled"
    pub fn display_title<'a>(&'a self, post_title: &'a str) -> &'a str {
        [self.title.as_str(), post_title]
            .into_iter()
            .find(|title| !title.trim().is_empty())
            .unwrap_or("untitled")
    }
}

/// One page of a channel listing
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<ContentRecord>,
    /// Opaque cursor for the next page
    pub next_offset: Option<String>,
    pub is_last: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPost {
    id: String,
    #[serde(default)]
    title: Option<String>,
    /// Seconds since the epoch
    created_at: f64,
    #[serde(default)]
    has_access: bool,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    player_urls: Option<Vec<RawPlayerUrl>>,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    default_preview: Option<String>,
}

#[derive(Deserialize)]
struct RawPlayerUrl {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    extra: RawExtra,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawExtra {
    #[serde(default)]
    offset: Option<Cursor>,
    #[serde(default)]
    is_last: bool,
}

/// The cursor has been seen both as a string and as a number
#[derive(Deserialize)]
#[serde(untagged)]
enum Cursor {
    Text(String),
    Number(serde_json::Number),
}

impl Cursor {
    fn into_offset(self) -> Option<String> {
        let offset = match self {
            Cursor::Text(text) => text,
            Cursor::Number(number) => number.to_string(),
        };
        (!offset.is_empty()).then_some(offset)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn post_id_of(value: &Value) -> String {
    match value.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "<unknown>".to_string(),
    }
}

fn parse_video(post_id: &str, value: Value) -> Result<MediaItem, ApiError> {
    let raw: RawVideo = serde_json::from_value(value).map_err(|e| ApiError::MalformedRecord {
        post_id: post_id.to_string(),
        reason: format!("invalid video item: {e}"),
    })?;

    let player_urls = raw.player_urls.unwrap_or_default();
    let variants = QualityVariant::collect(player_urls.iter().filter_map(|player_url| {
        player_url
            .url
            .as_deref()
            .map(|url| (player_url.kind.as_str(), url))
    }));

    Ok(MediaItem {
        completion: Completion::from_raw(raw.complete, raw.status.as_deref()),
        id: raw.id,
        title: raw.title.unwrap_or_default(),
        variants,
        preview_url: non_empty(raw.preview).or_else(|| non_empty(raw.default_preview)),
    })
}

/// Decode a single post object
pub fn parse_post(value: Value) -> Result<ContentRecord, ApiError> {
    let post_id = post_id_of(&value);
    let raw: RawPost = serde_json::from_value(value).map_err(|e| ApiError::MalformedRecord {
        post_id: post_id.clone(),
        reason: e.to_string(),
    })?;

    let seconds = raw.created_at.trunc() as i64;
    let nanos = (raw.created_at.fract() * 1e9) as u32;
    let created_at =
        DateTime::from_timestamp(seconds, nanos).ok_or_else(|| ApiError::MalformedRecord {
            post_id: post_id.clone(),
            reason: format!("createdAt out of range: {}", raw.created_at),
        })?;

    let media = raw
        .data
        .unwrap_or_default()
        .into_iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some(VIDEO_ITEM_TYPE))
        .map(|block| parse_video(&raw.id, block))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ContentRecord {
        id: raw.id,
        title: raw.title.unwrap_or_default(),
        created_at,
        has_access: raw.has_access,
        media,
    })
}

/// Decode a listing page, keeping the remote order of its posts
pub fn parse_page(url: &str, value: Value) -> Result<Page, ApiError> {
    let raw: RawPage = serde_json::from_value(value).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        source: e,
    })?;

    let records = raw
        .data
        .into_iter()
        .map(parse_post)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        records,
        next_offset: raw.extra.offset.and_then(Cursor::into_offset),
        is_last: raw.extra.is_last,
    })
}

/// Turn an API reply into JSON, classifying remote errors
pub fn decode_response(url: &str, response: &BytesResponse) -> Result<Value, ApiError> {
    if response.status == 401 {
        return Err(ApiError::Unauthorized {
            url: url.to_string(),
        });
    }

    let value: Value = match serde_json::from_slice(&response.body) {
        Ok(value) => value,
        Err(_) if !response.is_success() => {
            return Err(ApiError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Err(e) => {
            return Err(ApiError::Decode {
                url: url.to_string(),
                source: e,
            });
        }
    };

    if let Some(code) = value.get("error").filter(|code| !code.is_null()) {
        let code = code
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string());
        let description = value
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ApiError::Remote {
            url: url.to_string(),
            code,
            description,
        });
    }

    if !response.is_success() {
        return Err(ApiError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(value)
}
