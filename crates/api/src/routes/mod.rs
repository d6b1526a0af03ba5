pub mod auth;
pub mod health;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/login              login (public)
/// /auth/refresh            rotate token pair (public, needs refresh cookie)
/// /auth/logout             logout (requires auth)
/// /auth/csrf               mint a CSRF token (public)
///
/// /sessions                list own sessions (requires auth)
/// /sessions/others         terminate all but current (requires auth)
/// /sessions/{id}           terminate one (owner or admin)
/// /sessions/user/{id}      list or force-logout any user (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (login, refresh, logout, csrf).
        .nest("/auth", auth::router())
        // Session management routes.
        .nest("/sessions", sessions::router())
}
