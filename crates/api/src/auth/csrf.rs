//! Stateless CSRF tokens using the signed double-submit pattern.
//!
//! A token is `{nonce}.{timestamp}.{signature}` where the signature is
//! HMAC-SHA256 over `{nonce}.{timestamp}` with a server-side secret.
//! Nothing is stored server-side; validity comes from the signature and
//! the timestamp window.

use hmac::{Hmac, Mac};
use portal_core::error::CoreError;
use rand::RngCore;
use sha2::Sha256;

use crate::config::CsrfConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Nonce length in bytes before hex encoding.
const NONCE_BYTES: usize = 16;

/// Generates and verifies CSRF tokens against an injected config.
#[derive(Clone)]
pub struct CsrfGuard {
    config: CsrfConfig,
}

impl CsrfGuard {
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }

    /// The request header the double-submitted token arrives in.
    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// Token validity window in seconds, which is also the cookie age.
    pub fn max_age_secs(&self) -> i64 {
        self.config.max_age_secs
    }

    /// Whether Origin/Referer checking is enforced.
    pub fn check_origin(&self) -> bool {
        self.config.check_origin
    }

    /// Mint a fresh token stamped with the current time.
    pub fn generate(&self) -> String {
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.sign(&nonce, timestamp);
        format!("{nonce}.{timestamp}.{signature}")
    }

    /// Verify a presented token's structure, signature, and age.
    ///
    /// The signature is checked before the timestamp so a forged token
    /// learns nothing from the error. Comparison is constant-time via
    /// the HMAC verifier.
    pub fn verify(&self, token: &str) -> AppResult<()> {
        let mut parts = token.splitn(3, '.');
        let (nonce, timestamp_str, signature) =
            match (parts.next(), parts.next(), parts.next()) {
                (Some(n), Some(t), Some(s)) if !n.is_empty() && !s.is_empty() => (n, t, s),
                _ => return Err(csrf_rejected("Malformed CSRF token")),
            };

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| csrf_rejected("Malformed CSRF token"))?;

        let signature_bytes =
            hex::decode(signature).map_err(|_| csrf_rejected("Malformed CSRF token"))?;

        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| AppError::InternalError(format!("invalid CSRF secret: {e}")))?;
        mac.update(format!("{nonce}.{timestamp}").as_bytes());
        mac.verify_slice(&signature_bytes)
            .map_err(|_| csrf_rejected("Invalid CSRF token signature"))?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age < 0 || age > self.config.max_age_secs {
            return Err(csrf_rejected("CSRF token expired"));
        }

        Ok(())
    }

    /// Check a request's Origin (or Referer) header against the
    /// allow-list. `None` means the header was absent, which browsers
    /// omit for same-origin requests on some paths, so absence passes.
    pub fn verify_origin(&self, origin: Option<&str>, allowed: &[String]) -> AppResult<()> {
        let Some(value) = origin else {
            return Ok(());
        };
        if allowed.iter().any(|a| {
            value == a || value.strip_prefix(a.as_str()).is_some_and(|rest| rest.starts_with('/'))
        }) {
            return Ok(());
        }
        Err(csrf_rejected("Origin not allowed"))
    }

    fn sign(&self, nonce: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("{nonce}.{timestamp}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn csrf_rejected(msg: &str) -> AppError {
    CoreError::Forbidden(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn test_guard(max_age_secs: i64) -> CsrfGuard {
        CsrfGuard::new(CsrfConfig {
            secret: "csrf-test-secret".to_string(),
            max_age_secs,
            header_name: "x-csrf-token".to_string(),
            check_origin: true,
        })
    }

    #[test]
    fn generated_token_verifies() {
        let guard = test_guard(1800);
        let token = guard.generate();
        guard.verify(&token).expect("fresh token should verify");
    }

    #[test]
    fn tokens_are_unique() {
        let guard = test_guard(1800);
        assert_ne!(guard.generate(), guard.generate());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let guard = test_guard(1800);
        let token = guard.generate();

        // Flip the nonce; the signature no longer covers it.
        let mut parts: Vec<&str> = token.splitn(3, '.').collect();
        let altered_nonce = "00000000000000000000000000000000";
        parts[0] = altered_nonce;
        let tampered = parts.join(".");

        let result = guard.verify(&tampered);
        assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let guard_a = test_guard(1800);
        let guard_b = CsrfGuard::new(CsrfConfig {
            secret: "different-secret".to_string(),
            max_age_secs: 1800,
            header_name: "x-csrf-token".to_string(),
            check_origin: true,
        });

        let token = guard_a.generate();
        assert_matches!(
            guard_b.verify(&token),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let guard = test_guard(0);
        let nonce = "ab".repeat(NONCE_BYTES);
        let timestamp = chrono::Utc::now().timestamp() - 10;
        let signature = guard.sign(&nonce, timestamp);
        let token = format!("{nonce}.{timestamp}.{signature}");

        let result = guard.verify(&token);
        assert_matches!(
            result,
            Err(AppError::Core(CoreError::Forbidden(msg))) if msg.contains("expired")
        );
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let guard = test_guard(1800);
        let nonce = "cd".repeat(NONCE_BYTES);
        let timestamp = chrono::Utc::now().timestamp() + 3600;
        let signature = guard.sign(&nonce, timestamp);
        let token = format!("{nonce}.{timestamp}.{signature}");

        assert_matches!(
            guard.verify(&token),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let guard = test_guard(1800);
        for bad in ["", "a.b", "..", "a.notanumber.ff", "a.123.nothex!"] {
            assert!(guard.verify(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn origin_allow_list() {
        let guard = test_guard(1800);
        let allowed = vec!["http://localhost:5173".to_string()];

        guard
            .verify_origin(Some("http://localhost:5173"), &allowed)
            .expect("listed origin should pass");
        guard
            .verify_origin(Some("http://localhost:5173/login"), &allowed)
            .expect("referer under a listed origin should pass");
        guard
            .verify_origin(None, &allowed)
            .expect("absent header should pass");

        assert_matches!(
            guard.verify_origin(Some("http://evil.example"), &allowed),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
        assert_matches!(
            guard.verify_origin(Some("http://localhost:51730"), &allowed),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }
}
