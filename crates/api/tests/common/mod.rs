//! Shared helpers for HTTP-level integration tests.
//!
//! Builds the real application router on top of the in-memory token
//! cache, and provides a small cookie-aware request toolkit since the
//! auth surface lives entirely in cookies.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use portal_core::lockout::LockoutPolicy;
use sqlx::PgPool;
use tower::ServiceExt;

use portal_api::auth::csrf::CsrfGuard;
use portal_api::auth::tokens::TokenService;
use portal_api::cache::InMemoryTokenCache;
use portal_api::config::{CsrfConfig, JwtConfig, ServerConfig};
use portal_api::notify::Notifier;
use portal_api::router::build_app_router;
use portal_api::sessions::SessionRegistry;
use portal_api::state::AppState;

/// Origin used by every mutating test request; must be on the CORS and
/// CSRF allow-list in [`test_config`].
pub const TEST_ORIGIN: &str = "http://localhost:5173";

/// Session cap used in tests, small enough to exercise eviction.
pub const TEST_MAX_SESSIONS: usize = 3;

/// Build a test `ServerConfig` with safe defaults.
///
/// `cookie_secure` is off so cookies flow over the in-process plain
/// HTTP transport, and the session cap is lowered to make eviction
/// reachable without a pile of logins.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        cookie_secure: false,
        max_sessions: TEST_MAX_SESSIONS,
        lockout: LockoutPolicy {
            max_failed_attempts: 5,
            lockout_duration_mins: 15,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough".to_string(),
            access_token_expiry_mins: 30,
            refresh_token_expiry_days: 7,
        },
        csrf: CsrfConfig {
            secret: "integration-test-csrf-secret".to_string(),
            max_age_secs: 1800,
            header_name: "x-csrf-token".to_string(),
            check_origin: true,
        },
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool and an in-memory token cache.
///
/// This goes through the same [`build_app_router`] as `main.rs`, so
/// integration tests exercise the production middleware stack (CORS,
/// CSRF, request ID, timeout, tracing, panic recovery).
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let cache = Arc::new(InMemoryTokenCache::new());
    let tokens = TokenService::new(config.jwt.clone(), cache);
    let sessions = SessionRegistry::new(pool.clone(), tokens.clone(), config.max_sessions);
    let csrf = CsrfGuard::new(config.csrf.clone());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        tokens,
        sessions,
        csrf,
        notifier: Arc::new(Notifier::disabled()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Cookie store
// ---------------------------------------------------------------------------

/// Minimal client-side cookie jar: remembers `Set-Cookie` values and
/// replays them as a `Cookie` header. A `Set-Cookie` with an empty
/// value removes the cookie, matching how the handlers clear them.
#[derive(Debug, Default, Clone)]
pub struct CookieStore(BTreeMap<String, String>);

impl CookieStore {
    /// Record every `Set-Cookie` header on a response.
    pub fn absorb(&mut self, response: &Response<Body>) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or(raw);
            let Some((name, val)) = pair.split_once('=') else {
                continue;
            };
            if val.is_empty() {
                self.0.remove(name);
            } else {
                self.0.insert(name.to_string(), val.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Render the `Cookie` request header, or `None` when empty.
    pub fn header(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        Some(
            self.0
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("request should not fail at the transport level")
}

/// GET with the store's cookies attached.
pub async fn get(app: &Router, path: &str, cookies: &CookieStore) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie_header) = cookies.header() {
        builder = builder.header(header::COOKIE, cookie_header);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

/// Issue a mutating request: attaches cookies, the test origin, and the
/// double-submitted CSRF header, then absorbs any `Set-Cookie` replies.
pub async fn mutate(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<serde_json::Value>,
    cookies: &mut CookieStore,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::ORIGIN, TEST_ORIGIN);
    if let Some(cookie_header) = cookies.header() {
        builder = builder.header(header::COOKIE, cookie_header);
    }
    if let Some(token) = cookies.get("csrf_token") {
        builder = builder.header("x-csrf-token", token.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = send(app, request).await;
    cookies.absorb(&response);
    response
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}

/// Fetch a CSRF token into the store so mutating requests pass the
/// double-submit check.
pub async fn fetch_csrf(app: &Router, cookies: &mut CookieStore) {
    let response = get(app, "/api/v1/auth/csrf", cookies).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    cookies.absorb(&response);
}

/// Full login flow: fetch a CSRF token, then POST credentials. The
/// store ends up holding the access, refresh, and CSRF cookies.
pub async fn login(
    app: &Router,
    cookies: &mut CookieStore,
    login: &str,
    password: &str,
) -> Response<Body> {
    fetch_csrf(app, cookies).await;
    mutate(
        app,
        "POST",
        "/api/v1/auth/login",
        Some(serde_json::json!({ "login": login, "password": password })),
        cookies,
    )
    .await
}
