// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::error::AuthError;

/// Domain column value of the cookies we care about
pub const BOOSTY_COOKIE_DOMAIN: &str = ".boosty.to";

/// Prefix browsers use to mark HTTP-only entries in Netscape cookie files
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

const NAME_FIELD: usize = 5;
const VALUE_FIELD: usize = 6;

/// A Netscape-format cookie file, kept line by line so it can be rewritten
/// without disturbing unrelated entries.
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
    /// Raw lines including their terminators
    lines: Vec<String>,
}

/// Split a cookie line into its tab-separated fields, or `None` for comments,
/// blank lines and truncated entries
fn cookie_fields(line: &str) -> Option<Vec<&str>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let entry = line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line);

    if entry.starts_with('#') || entry.trim().is_empty() {
        return None;
    }

    let fields: Vec<&str> = entry.split('\t').collect();
    (fields.len() > VALUE_FIELD).then_some(fields)
}

fn is_boosty_cookie(fields: &[&str], name: &str) -> bool {
    fields[0] == BOOSTY_COOKIE_DOMAIN && fields[NAME_FIELD] == name
}

impl CookieJar {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::CookieFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// URL-decoded value of a boosty.to cookie
    pub fn get(&self, name: &str) -> Option<String> {
        self.lines.iter().find_map(|line| {
            let fields = cookie_fields(line)?;
            if !is_boosty_cookie(&fields, name) {
                return None;
            }
            let raw = fields[VALUE_FIELD];
            Some(
                urlencoding::decode(raw)
                    .map(|value| value.into_owned())
                    .unwrap_or_else(|_| raw.to_string()),
            )
        })
    }

    /// Replace the value of an existing boosty.to cookie.
    ///
    /// Returns `false` when no such cookie exists; nothing is added.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let encoded = urlencoding::encode(value);

        for line in &mut self.lines {
            let Some(fields) = cookie_fields(line) else {
                continue;
            };
            if !is_boosty_cookie(&fields, name) {
                continue;
            }

            let mut fields: Vec<String> = fields.into_iter().map(str::to_string).collect();
            fields[VALUE_FIELD] = encoded.to_string();

            let prefix = if line.starts_with(HTTP_ONLY_PREFIX) {
                HTTP_ONLY_PREFIX
            } else {
                ""
            };
            let body = line.trim_end_matches(['\r', '\n']);
            let terminator = &line[body.len()..];
            *line = format!("{prefix}{}{terminator}", fields.join("\t"));
            return true;
        }

        false
    }

    pub fn save(&self) -> Result<(), AuthError> {
        std::fs::write(&self.path, self.lines.concat()).map_err(|e| AuthError::CookieFileWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}
