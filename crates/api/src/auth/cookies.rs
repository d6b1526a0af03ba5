//! Cookie construction for the auth surface.
//!
//! Access and refresh tokens travel in `HttpOnly` cookies scoped to the
//! API path. The CSRF cookie is intentionally readable by script so the
//! frontend can echo it back in the request header.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Cookie carrying the CSRF token, readable by the frontend.
pub const CSRF_COOKIE: &str = "csrf_token";

/// All auth cookies are scoped to the API so they never ride along on
/// static asset requests.
const COOKIE_PATH: &str = "/api";

fn token_cookie(
    name: &'static str,
    value: String,
    secure: bool,
    max_age_secs: i64,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build the access token cookie.
pub fn access_cookie(token: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    token_cookie(ACCESS_TOKEN_COOKIE, token, secure, max_age_secs)
}

/// Build the refresh token cookie.
pub fn refresh_cookie(token: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    token_cookie(REFRESH_TOKEN_COOKIE, token, secure, max_age_secs)
}

/// Build the CSRF cookie. Not `HttpOnly`: the double-submit pattern
/// requires the frontend to read it and echo it in a header.
pub fn csrf_cookie(token: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token))
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build an expired cookie that clears `name` on the client.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_cookie_attributes() {
        let cookie = access_cookie("tok".into(), true, 1800);
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some(COOKIE_PATH));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(1800)));
    }

    #[test]
    fn csrf_cookie_is_script_readable() {
        let cookie = csrf_cookie("tok".into(), false, 1800);
        assert_ne!(cookie.http_only(), Some(true));
        assert_ne!(cookie.secure(), Some(true));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie(REFRESH_TOKEN_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
