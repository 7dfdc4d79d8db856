pub mod api;
pub mod auth;
pub mod error;
pub mod http;
pub mod lock;
pub mod metadata;
pub mod notify;
pub mod progress;
pub mod state;
pub mod sync;
pub mod video;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{ApiClient, ContentRecord, MediaItem, Target, parse_target};
pub use auth::{CookieAuth, find_default_cookies_file, load_access};
pub use error::{
    ApiError, AuthError, DownloadError, LockError, MetadataError, NotifyError, StateError,
    SyncError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use lock::InstanceLock;
pub use metadata::{LoftyEmbedder, MetadataEmbedder, TagSet};
pub use notify::{EmailNotifier, JellyfinNotifier, Notifier, PlexNotifier, notify_all};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, SkipReason,
};
pub use state::ensure_output_dir;
pub use sync::{
    ChannelListing, SyncOptions, SyncResult, SyncStats, Syncer, collect_listing, sync_channel,
    sync_links, sync_post,
};
pub use video::{Quality, generate_filename, select_url};
