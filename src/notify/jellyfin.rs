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

pub const DEFAULT_JELLYFIN_URL: &str = "http://localhost:8096";

#[derive(Debug, Clone)]
pub struct JellyfinConfig {
    pub url: String,
    pub token: String,
    /// Library item id or name
    pub item: String,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct ItemsResponse {
    #[serde(rename = "Items", default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
}

/// Asks a Jellyfin server to refresh one library folder
pub struct JellyfinNotifier<C> {
    client: C,
    config: JellyfinConfig,
}

impl<C: HttpClient> JellyfinNotifier<C> {
    pub fn new(client: C, config: JellyfinConfig) -> Self {
        Self { client, config }
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .header(
                "Authorization",
                format!("MediaBrowser Token=\"{}\"", self.config.token),
            )
            .timeout(self.config.timeout)
    }

    async fn resolve_item(&self) -> Result<String, NotifyError> {
        let url = format!(
            "{}/Items?Recursive=True&IncludeItemTypes=CollectionFolder",
            self.config.url
        );
        let response = send_checked(&self.client, self.authorize(HttpRequest::get(&url))).await?;
        let items: ItemsResponse = decode_json(&url, &response)?;

        items
            .items
            .into_iter()
            .find(|item| item.id == self.config.item || item.name == self.config.item)
            .map(|item| item.id)
            .ok_or_else(|| NotifyError::Unresolved {
                service: "Jellyfin",
                name: self.config.item.clone(),
            })
    }
}

#[async_trait]
impl<C: HttpClient> Notifier for JellyfinNotifier<C> {
    fn name(&self) -> &str {
        "jellyfin"
    }

    async fn notify(&self, _downloaded: &[String]) -> Result<(), NotifyError> {
        let id = self.resolve_item().await?;
        debug!(item = %self.config.item, %id, "refreshing Jellyfin item");

        let request = HttpRequest::post(format!("{}/Items/{id}/Refresh", self.config.url))
            .form_field("Recursive", "true")
            .form_field("MetadataRefreshMode", "Default")
            .form_field("ImageRefreshMode", "Default")
            .form_field("ReplaceAllImages", "false")
            .form_field("ReplaceAllMetadata", "false");

        send_checked(&self.client, self.authorize(request)).await?;
        Ok(())
    }
}
