mod cookies;
mod session;

use std::path::PathBuf;

pub use cookies::{BOOSTY_COOKIE_DOMAIN, CookieJar};
pub use session::{
    AUTH_COOKIE_NAME, AuthSession, CLIENT_ID_COOKIE_NAME, CookieAuth, REFRESH_THRESHOLD,
    load_access, refresh_session,
};

/// Cookie file names probed when none is given explicitly
const DEFAULT_COOKIE_FILES: [&str; 2] = ["cookies.txt", ".boosty.cookies.txt"];

/// First existing cookie file among the working directory defaults and
/// `~/.boosty.cookies.txt`
pub fn find_default_cookies_file() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".boosty.cookies.txt"));

    DEFAULT_COOKIE_FILES
        .into_iter()
        .map(PathBuf::from)
        .chain(home)
        .find(|path| path.exists())
}
