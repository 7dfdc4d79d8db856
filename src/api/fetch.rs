// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::CookieAuth;
use crate::error::ApiError;
use crate::http::{HttpClient, HttpRequest};

use super::parse::{ContentRecord, decode_response, parse_page, parse_post};

pub const BOOSTY_API_URL: &str = "https://api.boosty.to";

/// Posts requested per listing page
pub const PAGE_SIZE: usize = 25;

/// Client for the blog API.
///
/// When built with a cookie session, a `401` answer triggers one token
/// refresh followed by a single retry.
pub struct ApiClient<'a, C: HttpClient> {
    client: &'a C,
    base_url: String,
    auth: Option<CookieAuth>,
    refresh_attempted: bool,
}

impl<'a, C: HttpClient> ApiClient<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            base_url: BOOSTY_API_URL.to_string(),
            auth: None,
            refresh_attempted: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_auth(mut self, auth: Option<CookieAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn http(&self) -> &'a C {
        self.client
    }

    pub fn access_token(&self) -> Option<&str> {
        self.auth.as_ref().map(CookieAuth::access_token)
    }

    async fn try_refresh(&mut self) -> bool {
        if self.refresh_attempted {
            return false;
        }
        let Some(auth) = self.auth.as_mut() else {
            return false;
        };
        self.refresh_attempted = true;

        match auth.refresh(self.client, &self.base_url, Utc::now()).await {
            Ok(()) => {
                info!("access token refreshed after authorization failure");
                true
            }
            Err(e) => {
                warn!(reason = %e, "access token refresh failed");
                false
            }
        }
    }

    async fn get_json(&mut self, url: &str) -> Result<Value, ApiError> {
        loop {
            let request = HttpRequest::get(url).bearer(self.access_token());
            let response = self
                .client
                .send(request)
                .await
                .map_err(|e| ApiError::RequestFailed {
                    url: url.to_string(),
                    source: e,
                })?;

            let result = decode_response(url, &response);
            if let Err(e) = &result
                && e.is_unauthorized()
                && self.try_refresh().await
            {
                continue;
            }
            return result;
        }
    }

    fn list_url(&self, channel: &str, offset: Option<&str>) -> String {
        let mut url = format!(
            "{}/v1/blog/{channel}/post/?limit={PAGE_SIZE}",
            self.base_url
        );
        if let Some(offset) = offset {
            url.push_str("&offset=");
            url.push_str(&urlencoding::encode(offset));
        }
        url
    }

    /// Fetch a single post
    pub async fn get_post(
        &mut self,
        channel: &str,
        post_id: &str,
    ) -> Result<ContentRecord, ApiError> {
        let url = format!("{}/v1/blog/{channel}/post/{post_id}", self.base_url);
        let value = self.get_json(&url).await?;
        parse_post(value)
    }

    /// List a channel's posts, newest first, following the page cursor.
    ///
    /// With `days_back`, paging stops at the first post older than the
    /// cutoff; that post is dropped. This relies on the listing being
    /// ordered newest first.
    pub async fn list_posts(
        &mut self,
        channel: &str,
        days_back: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentRecord>, ApiError> {
        let cutoff = days_back.map(|days| now - TimeDelta::days(i64::from(days)));

        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let url = self.list_url(channel, offset.as_deref());
            debug!(channel, %url, "fetching page");

            let value = self.get_json(&url).await?;
            let page = parse_page(&url, value)?;

            for record in page.records {
                if let Some(cutoff) = cutoff
                    && record.created_at < cutoff
                {
                    debug!(channel, post_id = %record.id, "reached cutoff date");
                    return Ok(records);
                }
                records.push(record);
            }

            match page.next_offset {
                Some(next) if !page.is_last => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }
}
