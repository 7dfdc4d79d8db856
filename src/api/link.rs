// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::ApiError;

use super::parse::BOOSTY_SITE_URL;

/// What a command-line argument points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub channel: String,
    /// Set when the argument is a link to a single post
    pub post_id: Option<String>,
}

/// Interpret a channel name, channel URL or post URL.
///
/// Anything not starting with `https://` is taken as a bare channel name.
pub fn parse_target(input: &str) -> Result<Target, ApiError> {
    if !input.starts_with("https://") {
        return Ok(Target {
            channel: input.to_string(),
            post_id: None,
        });
    }

    let path = input
        .strip_prefix(BOOSTY_SITE_URL)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| ApiError::InvalidLink(input.to_string()))?;

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    let channel = parts[0];
    if channel.is_empty() {
        return Err(ApiError::InvalidLink(input.to_string()));
    }

    let post_id = match parts.as_slice() {
        [_, "posts", id, ..] if !id.is_empty() => Some(id.to_string()),
        _ => None,
    };

    Ok(Target {
        channel: channel.to_string(),
        post_id,
    })
}
