// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::decode_response;
use crate::error::{ApiError, AuthError};
use crate::http::{HttpClient, HttpRequest};

use super::cookies::CookieJar;

pub const AUTH_COOKIE_NAME: &str = "auth";
pub const CLIENT_ID_COOKIE_NAME: &str = "_clientId";

/// Tokens are refreshed once less than this much lifetime remains
pub const REFRESH_THRESHOLD: TimeDelta = TimeDelta::days(1);

/// Contents of the `auth` cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Milliseconds since the epoch
    pub expires_at: i64,
    /// Stored in its own cookie
    #[serde(skip)]
    pub client_id: Option<String>,
}

impl AuthSession {
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> TimeDelta {
        TimeDelta::milliseconds(self.expires_at - now.timestamp_millis())
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.time_until_expiry(now) < REFRESH_THRESHOLD
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Seconds
    expires_in: i64,
}

/// Exchange the refresh token for a new session
pub async fn refresh_session<C: HttpClient>(
    client: &C,
    base_url: &str,
    session: &AuthSession,
    now: DateTime<Utc>,
) -> Result<AuthSession, AuthError> {
    if session.refresh_token.is_empty() {
        return Err(AuthError::NoRefreshToken);
    }
    let client_id = session.client_id.as_deref().ok_or(AuthError::NoClientId)?;

    let url = format!("{base_url}/oauth/token/");
    let request = HttpRequest::post(&url)
        .form_field("grant_type", "refresh_token")
        .form_field("device_os", "web")
        .form_field("device_id", client_id)
        .form_field("refresh_token", &session.refresh_token);

    let response = client
        .send(request)
        .await
        .map_err(|e| ApiError::RequestFailed {
            url: url.clone(),
            source: e,
        })?;
    let value = decode_response(&url, &response)?;

    let tokens: TokenResponse = serde_json::from_value(value)
        .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

    Ok(AuthSession {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: now.timestamp_millis() + tokens.expires_in * 1000,
        client_id: Some(client_id.to_string()),
    })
}

/// An auth session backed by the cookie file it was read from
#[derive(Debug, Clone)]
pub struct CookieAuth {
    jar: CookieJar,
    session: AuthSession,
}

impl CookieAuth {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let jar = CookieJar::load(path)?;

        let raw = jar
            .get(AUTH_COOKIE_NAME)
            .ok_or_else(|| AuthError::MissingCookie {
                name: AUTH_COOKIE_NAME.to_string(),
                path: path.to_path_buf(),
            })?;

        let mut session: AuthSession =
            serde_json::from_str(&raw).map_err(AuthError::InvalidAuthCookie)?;
        session.client_id = jar.get(CLIENT_ID_COOKIE_NAME);

        Ok(Self { jar, session })
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn access_token(&self) -> &str {
        &self.session.access_token
    }

    /// Refresh the session and write the new `auth` cookie back to disk
    pub async fn refresh<C: HttpClient>(
        &mut self,
        client: &C,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let session = refresh_session(client, base_url, &self.session, now).await?;

        let value = serde_json::to_string(&session).map_err(AuthError::InvalidAuthCookie)?;
        if !self.jar.set(AUTH_COOKIE_NAME, &value) {
            return Err(AuthError::MissingCookie {
                name: AUTH_COOKIE_NAME.to_string(),
                path: self.jar.path().to_path_buf(),
            });
        }
        self.jar.save()?;

        self.session = session;
        Ok(())
    }
}

fn days(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 / 86_400.0
}

/// Load credentials from a cookie file, refreshing them when close to expiry.
///
/// A failed refresh falls back to the stored token while it is still valid;
/// with an expired token the result is `None` and only free content is
/// reachable.
pub async fn load_access<C: HttpClient>(
    client: &C,
    base_url: &str,
    path: &Path,
    force_refresh: bool,
    now: DateTime<Utc>,
) -> Result<Option<CookieAuth>, AuthError> {
    let mut auth = CookieAuth::load(path)?;
    let remaining = auth.session.time_until_expiry(now);

    if !force_refresh && remaining >= REFRESH_THRESHOLD {
        info!(
            expires_in_days = %format!("{:.1}", days(remaining)),
            "access token loaded"
        );
        return Ok(Some(auth));
    }

    if force_refresh {
        debug!("forcing access token refresh");
    } else if remaining < TimeDelta::zero() {
        warn!("access token expired, refreshing");
    } else {
        warn!(
            expires_in_hours = %format!("{:.1}", remaining.num_seconds() as f64 / 3600.0),
            "access token close to expiry, refreshing"
        );
    }

    match auth.refresh(client, base_url, now).await {
        Ok(()) => {
            info!(
                expires_in_days = %format!(
                    "{:.1}",
                    days(auth.session.time_until_expiry(now))
                ),
                "access token refreshed"
            );
            Ok(Some(auth))
        }
        Err(e) if remaining < TimeDelta::zero() => {
            warn!(reason = %e, "access token refresh failed and token expired");
            Ok(None)
        }
        Err(e) => {
            warn!(reason = %e, "access token refresh failed, using current token");
            Ok(Some(auth))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHttpClient, Reply};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const BASE: &str = "https://api.test";
    const TOKEN_URL: &str = "https://api.test/oauth/token/";

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn cookie_file(expires_at: i64) -> (TempDir, PathBuf) {
        let auth = json!({
            "accessToken": "old-access",
            "refreshToken": "old-refresh",
            "expiresAt": expires_at
        })
        .to_string();
        let content = format!(
            "# Netscape HTTP Cookie File\n\
             .boosty.to\tTRUE\t/\tFALSE\t0\t_clientId\tclient-1\n\
             .boosty.to\tTRUE\t/\tFALSE\t0\tauth\t{}\n",
            urlencoding::encode(&auth)
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn in_days(days: i64) -> i64 {
        (now() + TimeDelta::days(days)).timestamp_millis()
    }

    fn token_reply() -> serde_json::Value {
        json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 2_592_000
        })
    }

    #[test]
    fn load_reads_session_and_client_id() {
        let (_dir, path) = cookie_file(in_days(10));
        let auth = CookieAuth::load(&path).unwrap();

        assert_eq!(auth.access_token(), "old-access");
        assert_eq!(auth.session().refresh_token, "old-refresh");
        assert_eq!(auth.session().client_id.as_deref(), Some("client-1"));
        assert!(!auth.session().needs_refresh(now()));
    }

    #[tokio::test]
    async fn fresh_token_is_used_without_refresh() {
        let (_dir, path) = cookie_file(in_days(10));
        let client = FakeHttpClient::new();

        let auth = load_access(&client, BASE, &path, false, now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(auth.access_token(), "old-access");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn near_expiry_refreshes_and_rewrites_cookie() {
        let (_dir, path) = cookie_file(in_days(0) + 3_600_000);
        let client = FakeHttpClient::new().with_json(TOKEN_URL, token_reply());

        let auth = load_access(&client, BASE, &path, false, now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(auth.access_token(), "new-access");
        assert_eq!(
            auth.session().expires_at,
            now().timestamp_millis() + 2_592_000_000
        );

        let request = &client.requests()[0];
        let form = request.encoded_form();
        assert!(form.contains("grant_type=refresh_token"));
        assert!(form.contains("device_os=web"));
        assert!(form.contains("device_id=client-1"));
        assert!(form.contains("refresh_token=old-refresh"));

        let reloaded = CookieAuth::load(&path).unwrap();
        assert_eq!(reloaded.access_token(), "new-access");
        assert_eq!(reloaded.session().refresh_token, "new-refresh");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("_clientId\tclient-1\n"));
    }

    #[tokio::test]
    async fn forced_refresh_ignores_remaining_lifetime() {
        let (_dir, path) = cookie_file(in_days(20));
        let client = FakeHttpClient::new().with_json(TOKEN_URL, token_reply());

        let auth = load_access(&client, BASE, &path, true, now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(auth.access_token(), "new-access");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_still_valid_token() {
        let (_dir, path) = cookie_file(in_days(0) + 3_600_000);
        let client = FakeHttpClient::new().with_reply(TOKEN_URL, Reply::status(500));

        let auth = load_access(&client, BASE, &path, false, now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(auth.access_token(), "old-access");
    }

    #[tokio::test]
    async fn failed_refresh_of_expired_token_yields_none() {
        let (_dir, path) = cookie_file(in_days(-1));
        let client = FakeHttpClient::new().with_json(
            TOKEN_URL,
            json!({"error": "invalid_grant", "error_description": "expired"}),
        );

        let auth = load_access(&client, BASE, &path, false, now())
            .await
            .unwrap();

        assert!(auth.is_none());
    }

    #[tokio::test]
    async fn refresh_without_client_id_fails() {
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 0,
            client_id: None,
        };
        let client = FakeHttpClient::new();

        let result = refresh_session(&client, BASE, &session, now()).await;
        assert!(matches!(result, Err(AuthError::NoClientId)));
    }

    #[tokio::test]
    async fn refresh_rejects_incomplete_response() {
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 0,
            client_id: Some("c".to_string()),
        };
        let client = FakeHttpClient::new().with_json(TOKEN_URL, json!({"access_token": "x"}));

        let result = refresh_session(&client, BASE, &session, now()).await;
        assert!(matches!(result, Err(AuthError::InvalidTokenResponse(_))));
    }

    #[test]
    fn missing_auth_cookie_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, ".boosty.to\tTRUE\t/\tFALSE\t0\t_clientId\tc\n").unwrap();

        match CookieAuth::load(&path).unwrap_err() {
            AuthError::MissingCookie { name, .. } => assert_eq!(name, "auth"),
            other => panic!("Expected MissingCookie, got {other:?}"),
        }
    }
}
