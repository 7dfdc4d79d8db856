// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};

/// Extension of every finished video
pub const VIDEO_EXTENSION: &str = "mp4";

/// Characters that are not allowed in filenames on common filesystems
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Calendar day of a post, in the local time zone
pub fn local_date(created_at: DateTime<Utc>) -> NaiveDate {
    created_at.with_timezone(&Local).date_naive()
}

/// Strip filesystem-unsafe characters and surrounding whitespace
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Episode-style name: `s<year>e<mmdd>[<nn>] - <title>`
///
/// Index 0 has no numeric suffix; anything above is zero-padded to two digits.
pub fn generate_name(date: NaiveDate, index: u32, title: &str) -> String {
    let episode = if index == 0 {
        format!("s{}e{:02}{:02}", date.year(), date.month(), date.day())
    } else {
        format!(
            "s{}e{:02}{:02}{:02}",
            date.year(),
            date.month(),
            date.day(),
            index
        )
    };

    format!("{} - {}", episode, sanitize_title(title))
}

/// Complete filename for a video, carrying its id in brackets
pub fn generate_filename(date: NaiveDate, index: u32, title: &str, id: &str) -> String {
    format!(
        "{} [{}].{}",
        generate_name(date, index, title),
        id,
        VIDEO_EXTENSION
    )
}

/// Target directory: `<output>[/<channel>][/Season <year>]`
pub fn generate_dirname(
    output_dir: &Path,
    channel: &str,
    date: NaiveDate,
    use_channel_dir: bool,
    use_season_dir: bool,
) -> PathBuf {
    let mut directory = output_dir.to_path_buf();

    if use_channel_dir {
        directory.push(channel);
    }
    if use_season_dir {
        directory.push(format!("Season {}", date.year()));
    }

    directory
}
