mod fetch;
mod link;
mod parse;

pub use fetch::{ApiClient, BOOSTY_API_URL, PAGE_SIZE};
pub use link::{Target, parse_target};
pub use parse::{
    BOOSTY_SITE_URL, Completion, ContentRecord, MediaItem, Page, decode_response, parse_page,
    parse_post,
};
