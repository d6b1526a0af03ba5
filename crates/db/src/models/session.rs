//! Session model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use portal_core::types::{DbId, SessionId, Timestamp};

/// A session row from the `sessions` table.
///
/// Exactly one row exists per login event. Rows are only ever deactivated
/// (`is_active = false`), never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub user_id: DbId,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    pub is_active: bool,
}

/// Display-only device metadata captured at login.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
}

/// DTO for inserting a new session row.
pub struct CreateSession {
    pub user_id: DbId,
    pub device_info: DeviceInfo,
}

/// Session representation for API responses.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub user_id: DbId,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub platform: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    pub is_active: bool,
    /// Whether this row is the session the caller is authenticated with.
    pub is_current: bool,
}

impl SessionResponse {
    pub fn from_session(session: &Session, current_session_id: SessionId) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            device: session.device.clone(),
            browser: session.browser.clone(),
            os: session.os.clone(),
            platform: session.platform.clone(),
            location: session.location.clone(),
            ip_address: session.ip_address.clone(),
            created_at: session.created_at,
            last_activity: session.last_activity,
            is_active: session.is_active,
            is_current: session.id == current_session_id,
        }
    }
}
