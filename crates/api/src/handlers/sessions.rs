//! Handlers for the `/sessions` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use portal_core::roles::is_admin_role;
use portal_core::types::{DbId, SessionId};
use portal_db::models::session::SessionResponse;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for `DELETE /sessions/others`.
#[derive(Debug, Serialize)]
pub struct TerminatedResponse {
    pub terminated: u64,
}

/// GET /api/v1/sessions
///
/// List the caller's active sessions, most recently used first. The
/// session the caller is authenticated with is flagged `is_current`.
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SessionResponse>>>> {
    let sessions = state.sessions.get_active_sessions(user.user_id).await?;
    let data = sessions
        .iter()
        .map(|s| SessionResponse::from_session(s, user.session_id))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/sessions/user/{user_id}
///
/// Admin-only view of any user's active sessions.
pub async fn list_user_sessions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<SessionResponse>>>> {
    let sessions = state.sessions.get_active_sessions(user_id).await?;
    let data = sessions
        .iter()
        .map(|s| SessionResponse::from_session(s, admin.session_id))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// DELETE /api/v1/sessions/user/{user_id}
///
/// Admin-only force logout: deactivate every session of a user and
/// revoke all their tokens. Used when disabling an account or after a
/// credential reset.
pub async fn terminate_user_sessions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<TerminatedResponse>>> {
    let terminated = state.sessions.deactivate_all(user_id).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id,
        terminated,
        "Force-logged-out user"
    );
    Ok(Json(DataResponse {
        data: TerminatedResponse { terminated },
    }))
}

/// DELETE /api/v1/sessions/{session_id}
///
/// Terminate one session and revoke its tokens. The caller must own the
/// session or be an admin. Returns 204 No Content.
pub async fn terminate_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<SessionId>,
) -> AppResult<StatusCode> {
    state
        .sessions
        .deactivate_session(session_id, user.user_id, is_admin_role(&user.role))
        .await?;
    tracing::info!(
        user_id = user.user_id,
        session_id = %session_id,
        "Session terminated"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/sessions/others
///
/// Terminate every session of the caller except the current one.
pub async fn terminate_others(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<TerminatedResponse>>> {
    let terminated = state
        .sessions
        .terminate_others(user.user_id, user.session_id)
        .await?;
    tracing::info!(user_id = user.user_id, terminated, "Terminated other sessions");
    Ok(Json(DataResponse {
        data: TerminatedResponse { terminated },
    }))
}
