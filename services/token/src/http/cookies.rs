use axum_extra::extract::cookie::{Cookie, CookieJar, Expiration, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/api/refresh";

/// Refresh cookie, scoped to the refresh endpoint and expiring with the
/// refresh token.
pub(super) fn refresh_cookie(
    refresh_token: &str,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Cookie<'static> {
    let expiration = OffsetDateTime::from_unix_timestamp(expires_at.timestamp())
        .map(Expiration::DateTime)
        .unwrap_or(Expiration::Session);

    Cookie::build((REFRESH_COOKIE_NAME, refresh_token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .expires(expiration)
        .build()
}

pub(super) fn get_refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
