// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::NotifyError;
use crate::http::{HttpClient, HttpRequest};

use super::{Notifier, decode_json, send_checked};

pub const DEFAULT_PLEX_URL: &str = "http://localhost:32400";

#[derive(Debug, Clone)]
pub struct PlexConfig {
    pub url: String,
    pub token: String,
    /// Library section key or title
    pub section: String,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct SectionsResponse {
    #[serde(rename = "MediaContainer", default)]
    media_container: MediaContainer,
}

#[derive(Deserialize, Default)]
struct MediaContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<Section>,
}

#[derive(Deserialize)]
struct Section {
    #[serde(default)]
    key: String,
    #[serde(default)]
    title: String,
}

/// Asks a Plex server to rescan one library section
pub struct PlexNotifier<C> {
    client: C,
    config: PlexConfig,
}

impl<C: HttpClient> PlexNotifier<C> {
    pub fn new(client: C, config: PlexConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .header("X-Plex-Token", &self.config.token)
            .header("Accept", "application/json")
            .timeout(self.config.timeout)
    }

    async fn resolve_section(&self) -> Result<String, NotifyError> {
        let url = format!("{}/library/sections", self.config.url);
        let response = send_checked(&self.client, self.request(url.clone())).await?;
        let sections: SectionsResponse = decode_json(&url, &response)?;

        sections
            .media_container
            .directory
            .into_iter()
            .find(|section| {
                section.key == self.config.section || section.title == self.config.section
            })
            .map(|section| section.key)
            .ok_or_else(|| NotifyError::Unresolved {
                service: "Plex",
                name: self.config.section.clone(),
            })
    }
}

#[async_trait]
impl<C: HttpClient> Notifier for PlexNotifier<C> {
    fn name(&self) -> &str {
        "plex"
    }

    async fn notify(&self, _downloaded: &[String]) -> Result<(), NotifyError> {
        let key = self.resolve_section().await?;
        debug!(section = %self.config.section, %key, "refreshing Plex section");

        let url = format!("{}/library/sections/{key}/refresh", self.config.url);
        send_checked(&self.client, self.request(url)).await?;
        Ok(())
    }
}
