//! Access-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use portal_core::error::CoreError;
use portal_core::types::{DbId, SessionId};

use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::tokens::TokenType;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from an access token.
///
/// The token is taken from the `access_token` cookie when present, or
/// from an `Authorization: Bearer` header otherwise, and is verified
/// against the token cache so revoked tokens are rejected even before
/// their signed expiry.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id.
    pub user_id: DbId,
    /// The session the presented token belongs to.
    pub session_id: SessionId,
    /// The user's role name (e.g. `"admin"`, `"moderator"`, `"employee"`).
    pub role: String,
}

/// Pull the access token out of the request, cookie first.
pub(crate) fn extract_access_token(parts: &Parts) -> Result<String, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        return Ok(cookie.value().to_string());
    }

    let auth_header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing credentials".into()))
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })?;

    Ok(token.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_access_token(parts)?;
        let claims = state.tokens.verify_token(&token, TokenType::Access).await?;

        Ok(AuthUser {
            user_id: claims.user_id,
            session_id: claims.session_id,
            role: claims.role,
        })
    }
}
