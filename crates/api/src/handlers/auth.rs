//! Handlers for the `/auth` resource (login, refresh, logout, csrf).
//!
//! Tokens never appear in response bodies; they travel only in the
//! `HttpOnly` cookies set here.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use portal_core::error::CoreError;
use portal_core::lockout::LockState;
use portal_db::models::session::DeviceInfo;
use portal_db::models::user::UserResponse;
use portal_db::repositories::{SessionRepo, UserRepo};
use serde::Serialize;
use serde_json::json;

use crate::auth::cookies::{
    self, ACCESS_TOKEN_COOKIE, CSRF_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::auth::password::{verify_dummy_password, verify_password};
use crate::auth::tokens::TokenPair;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, serde::Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub login: String,
    pub password: String,
}

/// Successful authentication response returned by login and refresh.
/// The tokens themselves are in cookies, not the body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with username/email + password. Sets the access,
/// refresh, and CSRF cookies and returns the user profile.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let now = Utc::now();

    // 1. Find the user. When the identifier matches nobody, still burn
    //    a hash verification so timing does not leak account existence.
    let Some(user) = UserRepo::find_by_login_or_email(&state.pool, &input.login).await? else {
        verify_dummy_password();
        return Err(invalid_credentials());
    };

    // 2. Lockout gate, before the password is even looked at.
    if let LockState::Locked { remaining_secs } =
        state.config.lockout.lock_state(user.locked_until, now)
    {
        return Err(CoreError::AccountLocked {
            retry_after_secs: remaining_secs,
        }
        .into());
    }

    // 3. Deactivated accounts cannot log in regardless of password.
    if !user.is_active {
        return Err(CoreError::Forbidden("Account is deactivated".into()).into());
    }

    // 4. Verify the password.
    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        // 5. On failure: bump the counter, locking at the threshold.
        let outcome = state
            .config
            .lockout
            .register_failure(user.failed_login_count, now);
        UserRepo::record_failed_login(
            &state.pool,
            user.id,
            outcome.failed_login_count,
            outcome.locked_until,
        )
        .await?;

        if let Some(locked_until) = outcome.locked_until {
            tracing::warn!(user_id = user.id, "Account locked after repeated failures");
            return Err(CoreError::AccountLocked {
                retry_after_secs: (locked_until - now).num_seconds().max(1),
            }
            .into());
        }
        return Err(invalid_credentials());
    }

    // 6. On success: reset the counter and stamp last_login_at.
    UserRepo::record_successful_login(&state.pool, user.id).await?;

    // 7. Open a session, evicting the stalest one at the cap.
    let session = state
        .sessions
        .create_session(user.id, device_info_from_headers(&headers))
        .await?;

    // 8. Mint the token pair and set cookies.
    let pair = state
        .tokens
        .create_token_pair(user.id, session.id, &user.role)
        .await?;
    let jar = set_auth_cookies(jar, &state, pair);

    tracing::info!(user_id = user.id, session_id = %session.id, "User logged in");

    // 9. Login notification email, fire and forget.
    state
        .notifier
        .login_alert(user.email.clone(), user.username.clone(), &session);

    Ok((
        jar,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            expires_in: state.config.jwt.access_ttl_secs(),
        }),
    ))
}

/// POST /api/v1/auth/refresh
///
/// Rotate the refresh token: the presented token is atomically consumed
/// and blacklisted, and a fresh pair is issued for the same session. A
/// token that fails rotation takes its whole session down with it.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Response> {
    let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) else {
        return Err(CoreError::Unauthorized("Missing refresh token".into()).into());
    };
    let presented = cookie.value().to_string();

    // 1. Verify and consume; exactly one of two racing rotations wins.
    let claims = match state.tokens.take_refresh(&presented).await {
        Ok(claims) => claims,
        Err(err) => {
            // Replay or forgery: contain the token and its session.
            if let Some(claims) = state.tokens.quarantine_refresh(&presented).await? {
                SessionRepo::deactivate(&state.pool, claims.session_id).await?;
            }
            return Ok(rejected(jar, err));
        }
    };

    // 2. The consumed token dies for good, not just until re-issue.
    state.tokens.blacklist().add(&presented, claims.exp).await?;

    // 3. The session must still be active; this also stamps activity.
    if !state.sessions.check_validity(claims.session_id).await? {
        state
            .tokens
            .revoke_tokens(claims.user_id, Some(claims.session_id), None)
            .await?;
        return Ok(rejected(
            jar,
            CoreError::Unauthorized("Session is no longer active".into()).into(),
        ));
    }

    // 4. The account must still exist and be active.
    let user = match UserRepo::find_by_id(&state.pool, claims.user_id)
        .await?
        .filter(|u| u.is_active)
    {
        Some(user) => user,
        None => {
            return Ok(rejected(
                jar,
                CoreError::Unauthorized("Account is no longer active".into()).into(),
            ));
        }
    };

    // 5. Issue the new pair; the cache writes supersede the old access
    //    token in the same step.
    let pair = state
        .tokens
        .create_token_pair(user.id, claims.session_id, &user.role)
        .await?;
    let jar = set_auth_cookies(jar, &state, pair);

    tracing::debug!(user_id = user.id, session_id = %claims.session_id, "Rotated token pair");

    Ok((
        jar,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            expires_in: state.config.jwt.access_ttl_secs(),
        }),
    )
        .into_response())
}

/// POST /api/v1/auth/logout
///
/// Close the current session, revoke its tokens, and clear cookies.
/// Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, StatusCode)> {
    // Blacklist the refresh token so it stays dead for its full signed
    // lifetime, then drop the session.
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        let token = cookie.value().to_string();
        state.tokens.quarantine_refresh(&token).await?;
    }
    state
        .sessions
        .deactivate_session(user.session_id, user.user_id, false)
        .await?;

    tracing::info!(user_id = user.user_id, session_id = %user.session_id, "User logged out");

    Ok((clear_auth_cookies(jar), StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/csrf
///
/// Mint a CSRF token, set it as a readable cookie, and echo it in the
/// body. The frontend sends it back in the `x-csrf-token` header on
/// every mutating request.
pub async fn csrf_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<DataResponse<serde_json::Value>>)> {
    let token = state.csrf.generate();
    let jar = jar.add(cookies::csrf_cookie(
        token.clone(),
        state.config.cookie_secure,
        state.csrf.max_age_secs(),
    ));
    Ok((
        jar,
        Json(DataResponse {
            data: json!({ "csrf_token": token }),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_credentials() -> AppError {
    CoreError::Unauthorized("Invalid username or password".into()).into()
}

/// Capture what little device metadata the request carries.
fn device_info_from_headers(headers: &HeaderMap) -> DeviceInfo {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    DeviceInfo {
        device: user_agent,
        ip_address,
        ..DeviceInfo::default()
    }
}

fn set_auth_cookies(jar: CookieJar, state: &AppState, pair: TokenPair) -> CookieJar {
    jar.add(cookies::access_cookie(
        pair.access_token,
        state.config.cookie_secure,
        state.config.jwt.access_ttl_secs(),
    ))
    .add(cookies::refresh_cookie(
        pair.refresh_token,
        state.config.cookie_secure,
        state.config.jwt.refresh_ttl_secs(),
    ))
}

fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.add(cookies::removal_cookie(ACCESS_TOKEN_COOKIE))
        .add(cookies::removal_cookie(REFRESH_TOKEN_COOKIE))
        .add(cookies::removal_cookie(CSRF_COOKIE))
}

/// A rejected rotation clears the auth cookies alongside the error body
/// so the client does not keep replaying a dead token.
fn rejected(jar: CookieJar, err: AppError) -> Response {
    (clear_auth_cookies(jar), err).into_response()
}
