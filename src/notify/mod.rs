mod email;
mod jellyfin;
mod plex;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::http::{BytesResponse, HttpClient, HttpRequest};

pub use email::{DEFAULT_SENDMAIL, EmailNotifier, compose_message, compose_subject};
pub use jellyfin::{DEFAULT_JELLYFIN_URL, JellyfinConfig, JellyfinNotifier};
pub use plex::{DEFAULT_PLEX_URL, PlexConfig, PlexNotifier};

/// Default request timeout for media server calls, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Something to tell about newly downloaded files
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short label used in log messages
    fn name(&self) -> &str;

    async fn notify(&self, downloaded: &[String]) -> Result<(), NotifyError>;
}

/// Run every notifier; failures are logged and never propagate.
///
/// Nothing is sent when no file was downloaded. Returns the number of
/// notifiers that failed.
pub async fn notify_all(notifiers: &[Box<dyn Notifier>], downloaded: &[String]) -> usize {
    if downloaded.is_empty() {
        return 0;
    }

    let mut failures = 0;
    for notifier in notifiers {
        match notifier.notify(downloaded).await {
            Ok(()) => info!(notifier = notifier.name(), "notification sent"),
            Err(e) => {
                warn!(notifier = notifier.name(), reason = %e, "notification failed");
                failures += 1;
            }
        }
    }
    failures
}

/// Send a request and require a 2xx answer
async fn send_checked<C: HttpClient>(
    client: &C,
    request: HttpRequest,
) -> Result<BytesResponse, NotifyError> {
    let url = request.url.clone();
    let response = client
        .send(request)
        .await
        .map_err(|e| NotifyError::RequestFailed {
            url: url.clone(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(NotifyError::HttpStatus {
            url,
            status: response.status,
        });
    }
    Ok(response)
}

fn decode_json<T: serde::de::DeserializeOwned>(
    url: &str,
    response: &BytesResponse,
) -> Result<T, NotifyError> {
    serde_json::from_slice(&response.body).map_err(|e| NotifyError::Decode {
        url: url.to_string(),
        source: e,
    })
}
