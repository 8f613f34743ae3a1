//! Auth cookie helpers.

use axum::http::{HeaderMap, header::COOKIE};

/// Access token cookie name.
pub const ACCESS_COOKIE: &str = "accessToken";
/// Refresh token cookie name.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Access cookie lifetime in seconds.
pub const ACCESS_MAX_AGE: u64 = 15 * 60;
/// Refresh cookie lifetime in seconds.
pub const REFRESH_MAX_AGE: u64 = 7 * 24 * 3600;

fn build(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value for an access token.
#[must_use]
pub fn access_cookie(token: &str, secure: bool) -> String {
    build(ACCESS_COOKIE, token, ACCESS_MAX_AGE, secure)
}

/// `Set-Cookie` value for a refresh token.
#[must_use]
pub fn refresh_cookie(token: &str, secure: bool) -> String {
    build(REFRESH_COOKIE, token, REFRESH_MAX_AGE, secure)
}

/// `Set-Cookie` value that deletes `name`.
#[must_use]
pub fn clear_cookie(name: &str, secure: bool) -> String {
    build(name, "", 0, secure)
}

/// Read a cookie from the request headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
