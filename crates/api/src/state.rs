use std::sync::Arc;

use crate::auth::csrf::CsrfGuard;
use crate::auth::tokens::TokenService;
use crate::config::ServerConfig;
use crate::notify::Notifier;
use crate::sessions::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
/// The services are constructed once at startup and injected here rather
/// than reached through globals, so tests can assemble an `AppState` with
/// alternative backends.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: portal_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Token issuance, verification, rotation, and revocation.
    pub tokens: TokenService,
    /// Session rows plus their cached tokens.
    pub sessions: SessionRegistry,
    /// Stateless CSRF token generation and checking.
    pub csrf: CsrfGuard,
    /// Outbound login notification emails.
    pub notifier: Arc<Notifier>,
}
