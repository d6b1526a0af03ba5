//! Session registry: the authoritative view of which devices a user is
//! signed in from, with a per-user cap on concurrent sessions.
//!
//! Database rows are the source of truth; every state change here also
//! revokes the cached tokens of the affected sessions so a deactivated
//! session cannot keep authenticating until its tokens expire.

use portal_core::error::CoreError;
use portal_core::types::{DbId, SessionId};
use portal_db::models::session::{CreateSession, DeviceInfo, Session};
use portal_db::repositories::SessionRepo;
use portal_db::DbPool;

use crate::auth::tokens::TokenService;
use crate::error::AppResult;

/// Coordinates session rows and the token cache.
///
/// Constructed once at startup and shared through application state.
#[derive(Clone)]
pub struct SessionRegistry {
    pool: DbPool,
    tokens: TokenService,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(pool: DbPool, tokens: TokenService, max_sessions: usize) -> Self {
        Self {
            pool,
            tokens,
            max_sessions,
        }
    }

    /// Open a new session for a user, evicting the stalest active
    /// sessions if the user is at the concurrency cap. Tokens of
    /// evicted sessions are revoked after the row updates commit.
    pub async fn create_session(
        &self,
        user_id: DbId,
        device_info: DeviceInfo,
    ) -> AppResult<Session> {
        let (session, evicted) = SessionRepo::create_with_eviction(
            &self.pool,
            &CreateSession {
                user_id,
                device_info,
            },
            self.max_sessions,
        )
        .await?;

        // The rows are already committed inactive; a cache outage here
        // must not fail the login that triggered the eviction. Refresh
        // re-checks the row, so a missed revocation only lets the old
        // access token run out its signed expiry.
        for old in &evicted {
            match self
                .tokens
                .revoke_tokens(old.user_id, Some(old.id), None)
                .await
            {
                Ok(_) => tracing::info!(
                    user_id = old.user_id,
                    session_id = %old.id,
                    "Evicted stale session at concurrency cap"
                ),
                Err(err) => tracing::warn!(
                    user_id = old.user_id,
                    session_id = %old.id,
                    error = %err,
                    "Failed to revoke tokens of evicted session"
                ),
            }
        }

        Ok(session)
    }

    /// All active sessions for a user, most recently used first.
    pub async fn get_active_sessions(&self, user_id: DbId) -> AppResult<Vec<Session>> {
        Ok(SessionRepo::active_for_user(&self.pool, user_id).await?)
    }

    /// Look up a session by id.
    pub async fn get_session(&self, session_id: SessionId) -> AppResult<Option<Session>> {
        Ok(SessionRepo::find_by_id(&self.pool, session_id).await?)
    }

    /// Whether the session exists and is active, stamping its
    /// last-activity time as a side effect. Called on every token
    /// refresh so eviction ordering tracks real use.
    pub async fn check_validity(&self, session_id: SessionId) -> AppResult<bool> {
        Ok(SessionRepo::touch(&self.pool, session_id)
            .await?
            .unwrap_or(false))
    }

    /// Deactivate one session and revoke its tokens.
    ///
    /// Only the session's owner or an admin may do this. Deactivating
    /// an already-inactive session is a no-op, not an error.
    pub async fn deactivate_session(
        &self,
        session_id: SessionId,
        requester: DbId,
        requester_is_admin: bool,
    ) -> AppResult<()> {
        let session = SessionRepo::find_by_id(&self.pool, session_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Session {session_id} not found")))?;

        if session.user_id != requester && !requester_is_admin {
            return Err(CoreError::Forbidden("Cannot terminate another user's session".into()).into());
        }

        SessionRepo::deactivate(&self.pool, session_id).await?;
        self.tokens
            .revoke_tokens(session.user_id, Some(session_id), None)
            .await?;
        Ok(())
    }

    /// Deactivate every session of a user except the current one,
    /// revoking their tokens. Returns how many sessions were closed.
    pub async fn terminate_others(
        &self,
        user_id: DbId,
        current: SessionId,
    ) -> AppResult<u64> {
        let closed = SessionRepo::deactivate_others(&self.pool, user_id, current).await?;
        for session_id in &closed {
            self.tokens
                .revoke_tokens(user_id, Some(*session_id), None)
                .await?;
        }
        Ok(closed.len() as u64)
    }

    /// Deactivate every session of a user and revoke all their tokens.
    /// Used when an account is disabled or credentials are reset.
    pub async fn deactivate_all(&self, user_id: DbId) -> AppResult<u64> {
        let closed = SessionRepo::deactivate_all(&self.pool, user_id).await?;
        self.tokens.revoke_tokens(user_id, None, None).await?;
        Ok(closed)
    }
}
