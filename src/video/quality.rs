// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Video quality labels used by the player, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Tiny,
    Lowest,
    Low,
    Medium,
    High,
    FullHd,
    QuadHd,
    UltraHd,
}

impl Quality {
    /// All qualities, worst first
    pub const ALL: [Quality; 8] = [
        Quality::Tiny,
        Quality::Lowest,
        Quality::Low,
        Quality::Medium,
        Quality::High,
        Quality::FullHd,
        Quality::QuadHd,
        Quality::UltraHd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Tiny => "tiny",
            Quality::Lowest => "lowest",
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::FullHd => "full_hd",
            Quality::QuadHd => "quad_hd",
            Quality::UltraHd => "ultra_hd",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "unknown quality '{0}' (expected one of: tiny, lowest, low, medium, high, full_hd, quad_hd, ultra_hd)"
)]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|quality| quality.as_str() == s)
            .ok_or_else(|| UnknownQuality(s.to_string()))
    }
}

/// One playable rendition of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityVariant {
    pub quality: Quality,
    pub url: String,
}

impl QualityVariant {
    /// Build variants from raw `(tag, url)` pairs.
    ///
    /// Unknown tags and empty URLs are dropped; if a tag repeats, the first
    /// URL wins.
    pub fn collect<'a>(raw: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<Self> {
        let mut variants: Vec<Self> = Vec::new();

        for (tag, url) in raw {
            let Ok(quality) = tag.parse::<Quality>() else {
                continue;
            };
            if url.is_empty() || variants.iter().any(|v| v.quality == quality) {
                continue;
            }
            variants.push(Self {
                quality,
                url: url.to_string(),
            });
        }

        variants
    }
}

/// Pick the URL to download.
///
/// Without a ceiling the best available quality wins. With a ceiling the
/// best quality not above it wins; if every variant is above the ceiling
/// nothing is selected.
pub fn select_url(variants: &[QualityVariant], ceiling: Option<Quality>) -> Option<&str> {
    variants
        .iter()
        .filter(|variant| !variant.url.is_empty())
        .filter(|variant| ceiling.is_none_or(|max| variant.quality <= max))
        .max_by_key(|variant| variant.quality)
        .map(|variant| variant.url.as_str())
}
