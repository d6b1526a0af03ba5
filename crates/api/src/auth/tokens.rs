//! JWT issuance and verification backed by the token cache.
//!
//! Every issued token is both HS256-signed and registered in the cache
//! under `token:{type}:{user}:{session}`. A token is only valid while
//! its cache entry exists and matches byte for byte, so the server can
//! revoke any token at any time regardless of its signed expiry.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use portal_core::error::CoreError;
use portal_core::types::{DbId, SessionId};
use serde::{Deserialize, Serialize};

use crate::auth::blacklist::Blacklist;
use crate::cache::TokenCache;
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

/// The two token kinds the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Wire name, also the `{type}` segment of the cache key.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims embedded in every issued token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Unique id of this individual mint. Timestamps are only
    /// second-granular, so without it two mints for the same session in
    /// the same second would serialize byte-identically and collide in
    /// the blacklist.
    pub jti: uuid::Uuid,
    /// The user's internal database id.
    pub user_id: DbId,
    /// The session this token belongs to.
    pub session_id: SessionId,
    /// The user's role name (e.g. `"admin"`, `"employee"`).
    pub role: String,
    /// Which kind of token this is.
    pub token_type: TokenType,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// An access/refresh pair minted together for one session.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Cache key for a live token: `token:{type}:{user}:{session}`.
fn token_key(token_type: TokenType, user_id: DbId, session_id: SessionId) -> String {
    format!("token:{}:{user_id}:{session_id}", token_type.as_str())
}

/// Issues, verifies, rotates, and revokes tokens.
///
/// Constructed once at startup and shared through application state.
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    cache: Arc<dyn TokenCache>,
    blacklist: Blacklist,
}

impl TokenService {
    pub fn new(config: JwtConfig, cache: Arc<dyn TokenCache>) -> Self {
        let blacklist = Blacklist::new(cache.clone());
        Self {
            config,
            cache,
            blacklist,
        }
    }

    /// The revocation blacklist sharing this service's cache.
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Liveness probe against the backing cache, for health checks.
    pub async fn ping_cache(&self) -> AppResult<()> {
        self.cache.ping().await?;
        Ok(())
    }

    fn ttl_secs(&self, token_type: TokenType) -> i64 {
        match token_type {
            TokenType::Access => self.config.access_ttl_secs(),
            TokenType::Refresh => self.config.refresh_ttl_secs(),
        }
    }

    /// Sign a token and register it in the cache.
    ///
    /// The cache write replaces any previous token of the same kind for
    /// this session in one atomic step, so at most one access and one
    /// refresh token per session are ever live.
    pub async fn create_token(
        &self,
        user_id: DbId,
        session_id: SessionId,
        role: &str,
        token_type: TokenType,
    ) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let ttl = self.ttl_secs(token_type);

        let claims = Claims {
            jti: uuid::Uuid::new_v4(),
            user_id,
            session_id,
            role: role.to_string(),
            token_type,
            exp: now + ttl,
            iat: now,
        };

        let token = encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("token encoding failed: {e}")))?;

        self.cache
            .put(&token_key(token_type, user_id, session_id), &token, ttl as u64)
            .await?;

        Ok(token)
    }

    /// Mint a fresh access/refresh pair for a session.
    pub async fn create_token_pair(
        &self,
        user_id: DbId,
        session_id: SessionId,
        role: &str,
    ) -> AppResult<TokenPair> {
        let access_token = self
            .create_token(user_id, session_id, role, TokenType::Access)
            .await?;
        let refresh_token = self
            .create_token(user_id, session_id, role, TokenType::Refresh)
            .await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify a presented token and return its claims.
    ///
    /// Checks, in order: signature, token kind, signed expiry (removing
    /// the stale cache entry when expired), the revocation blacklist
    /// for refresh tokens, cache presence, and byte equality with the
    /// cached value. Cache failures propagate as errors rather than
    /// passing or failing the token.
    pub async fn verify_token(&self, token: &str, expected: TokenType) -> AppResult<Claims> {
        let claims = self.decode_unchecked(token)?;

        if claims.token_type != expected {
            return Err(CoreError::Unauthorized("Invalid token type".into()).into());
        }

        let key = token_key(claims.token_type, claims.user_id, claims.session_id);

        if claims.exp <= chrono::Utc::now().timestamp() {
            // The cache entry may outlive the signed expiry by clock
            // skew; drop it, but only while it still holds this exact
            // token. The key may already carry a newer live mint.
            self.cache.compare_and_delete(&key, token).await?;
            return Err(CoreError::Unauthorized("Token expired".into()).into());
        }

        // Refresh tokens are long-lived, so an explicit revocation list
        // guards them even while the cache entry exists.
        if claims.token_type == TokenType::Refresh && self.blacklist.contains(token).await? {
            return Err(CoreError::Unauthorized("Token revoked".into()).into());
        }

        match self.cache.get(&key).await? {
            Some(stored) if stored == token => Ok(claims),
            Some(_) => Err(CoreError::Unauthorized("Token superseded".into()).into()),
            None => Err(CoreError::Unauthorized("Token revoked".into()).into()),
        }
    }

    /// Verify and atomically consume a refresh token.
    ///
    /// The cache entry is deleted only if it still equals the presented
    /// token, so of two concurrent rotations exactly one wins and the
    /// other gets an unauthorized error.
    pub async fn take_refresh(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token, TokenType::Refresh).await?;
        let key = token_key(TokenType::Refresh, claims.user_id, claims.session_id);
        if !self.cache.compare_and_delete(&key, token).await? {
            return Err(CoreError::Unauthorized("Token already used".into()).into());
        }
        Ok(claims)
    }

    /// Revoke live tokens by deleting their cache entries.
    ///
    /// `session_id` of `None` targets every session of the user, and
    /// `token_type` of `None` targets both kinds. Returns how many
    /// entries were removed; revoking nothing is not an error.
    pub async fn revoke_tokens(
        &self,
        user_id: DbId,
        session_id: Option<SessionId>,
        token_type: Option<TokenType>,
    ) -> AppResult<u64> {
        let type_part = token_type.map_or("*", |t| t.as_str());
        let session_part = session_id.map_or_else(|| "*".to_string(), |s| s.to_string());
        let pattern = format!("token:{type_part}:{user_id}:{session_part}");
        let removed = self.cache.delete_pattern(&pattern).await?;
        tracing::debug!(user_id, pattern = %pattern, removed, "Revoked tokens");
        Ok(removed)
    }

    /// Best-effort containment of a refresh token that failed rotation.
    ///
    /// If the token decodes, it is blacklisted for its remaining signed
    /// lifetime and every live token of its session is revoked, and the
    /// claims are returned so the caller can deactivate the session
    /// row. A token that does not even decode has nothing to contain.
    pub async fn quarantine_refresh(&self, token: &str) -> AppResult<Option<Claims>> {
        let Ok(claims) = self.decode_unchecked(token) else {
            return Ok(None);
        };
        self.blacklist.add(token, claims.exp).await?;
        self.revoke_tokens(claims.user_id, Some(claims.session_id), None)
            .await?;
        tracing::warn!(
            user_id = claims.user_id,
            session_id = %claims.session_id,
            "Quarantined refresh token after failed rotation"
        );
        Ok(Some(claims))
    }

    /// Decode a token's claims, validating the signature but not the
    /// expiry; expiry is checked separately so the stale cache entry
    /// can be cleaned up.
    fn decode_unchecked(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default(); // HS256
        validation.validate_exp = false;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| CoreError::Unauthorized("Invalid token".to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryTokenCache;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 30,
            refresh_token_expiry_days: 7,
        }
    }

    fn test_service() -> TokenService {
        TokenService::new(test_config(), Arc::new(InMemoryTokenCache::new()))
    }

    #[tokio::test]
    async fn create_and_verify_roundtrip() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let token = svc
            .create_token(42, session, "admin", TokenType::Access)
            .await
            .expect("token creation should succeed");

        let claims = svc
            .verify_token(&token, TokenType::Access)
            .await
            .expect("verification should succeed");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.session_id, session);
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn wrong_token_type_is_rejected() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let refresh = svc
            .create_token(1, session, "employee", TokenType::Refresh)
            .await
            .unwrap();

        let result = svc.verify_token(&refresh, TokenType::Access).await;
        assert_matches!(
            result,
            Err(AppError::Core(CoreError::Unauthorized(msg))) if msg.contains("token type")
        );
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let svc = test_service();
        let result = svc.verify_token("not-a-jwt", TokenType::Access).await;
        assert_matches!(result, Err(AppError::Core(CoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn reissue_supersedes_previous_token() {
        let cache = Arc::new(InMemoryTokenCache::new());
        let svc = TokenService::new(test_config(), cache.clone());
        let session = Uuid::new_v4();
        let first = svc
            .create_token(7, session, "employee", TokenType::Access)
            .await
            .unwrap();
        let second = svc
            .create_token(7, session, "employee", TokenType::Access)
            .await
            .unwrap();
        assert_ne!(first, second, "every mint carries a fresh jti");

        let result = svc.verify_token(&first, TokenType::Access).await;
        assert_matches!(result, Err(AppError::Core(CoreError::Unauthorized(_))));
        svc.verify_token(&second, TokenType::Access)
            .await
            .expect("latest token should verify");

        let stored = cache
            .get(&token_key(TokenType::Access, 7, session))
            .await
            .unwrap();
        assert_eq!(
            stored.as_deref(),
            Some(second.as_str()),
            "the cache key holds exactly the latest mint"
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let token = svc
            .create_token(9, session, "employee", TokenType::Access)
            .await
            .unwrap();

        let removed = svc
            .revoke_tokens(9, Some(session), Some(TokenType::Access))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let result = svc.verify_token(&token, TokenType::Access).await;
        assert_matches!(result, Err(AppError::Core(CoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn revoke_all_sessions_with_wildcard() {
        let svc = test_service();
        let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
        svc.create_token_pair(3, s1, "employee").await.unwrap();
        svc.create_token_pair(3, s2, "employee").await.unwrap();
        svc.create_token_pair(4, Uuid::new_v4(), "employee")
            .await
            .unwrap();

        let removed = svc.revoke_tokens(3, None, None).await.unwrap();
        assert_eq!(removed, 4, "both pairs for user 3, nothing for user 4");

        let removed_again = svc.revoke_tokens(3, None, None).await.unwrap();
        assert_eq!(removed_again, 0, "revoking nothing is not an error");
    }

    #[tokio::test]
    async fn take_refresh_consumes_exactly_once() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let pair = svc.create_token_pair(5, session, "moderator").await.unwrap();

        let claims = svc
            .take_refresh(&pair.refresh_token)
            .await
            .expect("first rotation should succeed");
        assert_eq!(claims.user_id, 5);

        let second = svc.take_refresh(&pair.refresh_token).await;
        assert_matches!(second, Err(AppError::Core(CoreError::Unauthorized(_))));
    }

    /// The full rotation sequence: consume the old refresh token,
    /// blacklist it, mint a replacement. Even when everything lands in
    /// the same wall-clock second the replacement is a different byte
    /// string, so blacklisting the consumed token never poisons it.
    #[tokio::test]
    async fn rotation_immediately_after_issue_yields_a_live_pair() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let pair = svc.create_token_pair(8, session, "employee").await.unwrap();

        let claims = svc.take_refresh(&pair.refresh_token).await.unwrap();
        svc.blacklist()
            .add(&pair.refresh_token, claims.exp)
            .await
            .unwrap();

        let rotated = svc.create_token_pair(8, session, "employee").await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        svc.verify_token(&rotated.refresh_token, TokenType::Refresh)
            .await
            .expect("freshly rotated refresh token must verify");
        svc.verify_token(&rotated.access_token, TokenType::Access)
            .await
            .expect("freshly rotated access token must verify");
    }

    /// Replaying an expired token must not evict the live token that
    /// now occupies the same cache key.
    #[tokio::test]
    async fn expired_token_replay_leaves_live_token_intact() {
        let cache = Arc::new(InMemoryTokenCache::new());
        let expired_svc = TokenService::new(
            JwtConfig {
                access_token_expiry_mins: 0,
                ..test_config()
            },
            cache.clone(),
        );
        let live_svc = TokenService::new(test_config(), cache);

        let session = Uuid::new_v4();
        let stale = expired_svc
            .create_token(11, session, "employee", TokenType::Access)
            .await
            .unwrap();
        let live = live_svc
            .create_token(11, session, "employee", TokenType::Access)
            .await
            .unwrap();

        let result = live_svc.verify_token(&stale, TokenType::Access).await;
        assert_matches!(
            result,
            Err(AppError::Core(CoreError::Unauthorized(msg))) if msg.contains("expired")
        );
        live_svc
            .verify_token(&live, TokenType::Access)
            .await
            .expect("live token must survive the stale replay");
    }

    #[tokio::test]
    async fn blacklisted_refresh_is_rejected() {
        let svc = test_service();
        let session = Uuid::new_v4();
        let pair = svc.create_token_pair(6, session, "employee").await.unwrap();

        let exp = chrono::Utc::now().timestamp() + 3600;
        svc.blacklist()
            .add(&pair.refresh_token, exp)
            .await
            .unwrap();

        let result = svc.verify_token(&pair.refresh_token, TokenType::Refresh).await;
        assert_matches!(
            result,
            Err(AppError::Core(CoreError::Unauthorized(msg))) if msg.contains("revoked")
        );
    }
}
