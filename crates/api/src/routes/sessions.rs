//! Route definitions for the `/sessions` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// GET    /               -> list own active sessions
/// DELETE /others         -> terminate all but the current session
/// DELETE /{session_id}   -> terminate one session (owner or admin)
/// GET    /user/{user_id} -> list any user's sessions (admin only)
/// DELETE /user/{user_id} -> force logout a user everywhere (admin only)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list_sessions))
        .route("/others", delete(sessions::terminate_others))
        .route("/{session_id}", delete(sessions::terminate_session))
        .route(
            "/user/{user_id}",
            get(sessions::list_user_sessions).delete(sessions::terminate_user_sessions),
        )
}
