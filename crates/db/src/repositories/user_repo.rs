//! Repository for the `users` table.

use sqlx::PgPool;
use portal_core::types::{DbId, Timestamp};

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, email, password_hash, role, is_active, \
                        last_login_at, failed_login_count, locked_until, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.role)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username or email (the login form accepts either).
    pub async fn find_by_login_or_email(
        pool: &PgPool,
        login_or_email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1 OR email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(login_or_email)
            .fetch_optional(pool)
            .await
    }

    /// Persist the outcome of a failed login attempt: the new counter
    /// value and, when the threshold was hit, the lockout deadline.
    pub async fn record_failed_login(
        pool: &PgPool,
        id: DbId,
        failed_login_count: i32,
        locked_until: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users
             SET failed_login_count = $2,
                 locked_until = COALESCE($3, locked_until),
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(failed_login_count)
        .bind(locked_until)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset the failure counter, clear any (possibly stale) lockout, and
    /// stamp `last_login_at`.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users
             SET failed_login_count = 0,
                 locked_until = NULL,
                 last_login_at = now(),
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
