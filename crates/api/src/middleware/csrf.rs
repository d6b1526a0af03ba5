//! CSRF protection layer using the signed double-submit pattern.
//!
//! Mutating requests must carry the CSRF token twice: in the readable
//! `csrf_token` cookie and echoed in the request header. The two must
//! be equal and the token's signature and age must check out. Safe
//! methods pass through untouched.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use portal_core::error::CoreError;

use crate::auth::cookies::CSRF_COOKIE;
use crate::error::AppError;
use crate::state::AppState;

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reject mutating requests without a valid double-submitted CSRF token.
pub async fn csrf_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_safe(request.method()) {
        return Ok(next.run(request).await);
    }

    if state.csrf.check_origin() {
        // Origin is preferred; older browsers only send Referer.
        let origin = request
            .headers()
            .get("origin")
            .or_else(|| request.headers().get("referer"))
            .and_then(|v| v.to_str().ok());
        state
            .csrf
            .verify_origin(origin, &state.config.cors_origins)?;
    }

    let jar = CookieJar::from_headers(request.headers());
    let cookie_token = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| forbidden("Missing CSRF cookie"))?;

    let header_token = request
        .headers()
        .get(state.csrf.header_name())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| forbidden("Missing CSRF header"))?;

    if cookie_token != header_token {
        return Err(forbidden("CSRF token mismatch"));
    }

    state.csrf.verify(header_token)?;

    Ok(next.run(request).await)
}

fn forbidden(msg: &str) -> AppError {
    AppError::Core(CoreError::Forbidden(msg.to_string()))
}
