// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::NotifyError;

use super::Notifier;

pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

pub fn compose_subject(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("Boosty: {count} new file{plural} downloaded")
}

/// Full message as handed to `sendmail -t`
pub fn compose_message(to: &str, downloaded: &[String]) -> String {
    let plural = if downloaded.len() == 1 { "" } else { "s" };
    let list: Vec<String> = downloaded.iter().map(|name| format!("- {name}")).collect();

    format!(
        "To: {to}\nSubject: {}\n\nDownloaded {} file{plural}:\n\n{}",
        compose_subject(downloaded.len()),
        downloaded.len(),
        list.join("\n")
    )
}

/// Mails the list of new files through the local sendmail binary
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    sendmail: PathBuf,
    to: String,
}

impl EmailNotifier {
    pub fn new(sendmail: impl Into<PathBuf>, to: impl Into<String>) -> Self {
        Self {
            sendmail: sendmail.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, downloaded: &[String]) -> Result<(), NotifyError> {
        let spawn_failed = |source| NotifyError::SpawnFailed {
            program: self.sendmail.clone(),
            source,
        };

        let mut child = Command::new(&self.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        let message = compose_message(&self.to, downloaded);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .await
                .map_err(spawn_failed)?;
        }

        let output = child.wait_with_output().await.map_err(spawn_failed)?;
        if !output.status.success() {
            return Err(NotifyError::CommandFailed {
                program: self.sendmail.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
