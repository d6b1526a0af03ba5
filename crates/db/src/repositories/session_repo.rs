//! Repository for the `sessions` table.

use sqlx::PgPool;
use portal_core::types::{DbId, SessionId};

use crate::models::session::{CreateSession, Session};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, device, browser, os, platform, location, \
                        ip_address, created_at, last_activity, is_active";

/// Provides row-level operations for sessions.
///
/// The concurrent-session cap is enforced in [`SessionRepo::create_with_eviction`];
/// everything else is a single statement.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session row, evicting the oldest active sessions first
    /// when the user is at `max_sessions`.
    ///
    /// The read-decide-write sequence runs inside one transaction with the
    /// user's active rows locked (`FOR UPDATE`), so two simultaneous logins
    /// cannot both observe a free slot and overshoot the cap.
    ///
    /// Returns the new session and the rows that were deactivated to make
    /// room; the caller is responsible for revoking the evicted sessions'
    /// tokens after commit.
    pub async fn create_with_eviction(
        pool: &PgPool,
        input: &CreateSession,
        max_sessions: usize,
    ) -> Result<(Session, Vec<Session>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Oldest-activity first; ties broken by creation time.
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE user_id = $1 AND is_active = true
             ORDER BY last_activity ASC, created_at ASC
             FOR UPDATE"
        );
        let active = sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut evicted = Vec::new();
        if active.len() >= max_sessions {
            let surplus = active.len() - max_sessions + 1;
            let victim_ids: Vec<SessionId> = active[..surplus].iter().map(|s| s.id).collect();
            let query = format!(
                "UPDATE sessions
                 SET is_active = false, last_activity = now()
                 WHERE id = ANY($1)
                 RETURNING {COLUMNS}"
            );
            evicted = sqlx::query_as::<_, Session>(&query)
                .bind(&victim_ids)
                .fetch_all(&mut *tx)
                .await?;
        }

        let info = &input.device_info;
        let query = format!(
            "INSERT INTO sessions (user_id, device, browser, os, platform, location, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(&info.device)
            .bind(&info.browser)
            .bind(&info.os)
            .bind(&info.platform)
            .bind(&info.location)
            .bind(&info.ip_address)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((session, evicted))
    }

    /// Find a session by ID.
    pub async fn find_by_id(pool: &PgPool, id: SessionId) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active sessions for a user, most recently active first.
    pub async fn active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE user_id = $1 AND is_active = true
             ORDER BY last_activity DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Refresh `last_activity` and report whether the session is active.
    ///
    /// This is deliberately a write: validity checks double as activity
    /// touches. Returns `None` if the session does not exist.
    pub async fn touch(pool: &PgPool, id: SessionId) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE sessions SET last_activity = now() WHERE id = $1 RETURNING is_active",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Deactivate a single session. Returns `true` if a row was flipped.
    pub async fn deactivate(pool: &PgPool, id: SessionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false, last_activity = now()
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate every active session of the user except `current`.
    ///
    /// Returns the IDs of the deactivated sessions so the caller can
    /// revoke their tokens.
    pub async fn deactivate_others(
        pool: &PgPool,
        user_id: DbId,
        current: SessionId,
    ) -> Result<Vec<SessionId>, sqlx::Error> {
        sqlx::query_scalar::<_, SessionId>(
            "UPDATE sessions SET is_active = false, last_activity = now()
             WHERE user_id = $1 AND id <> $2 AND is_active = true
             RETURNING id",
        )
        .bind(user_id)
        .bind(current)
        .fetch_all(pool)
        .await
    }

    /// Deactivate every active session of the user. Returns the count.
    pub async fn deactivate_all(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false, last_activity = now()
             WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
