//! Domain error taxonomy shared by every crate in the workspace.
//!
//! The HTTP mapping lives in `portal-api::error`; this enum only encodes
//! what went wrong, not how it is presented.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, invalid, expired, type-mismatched, superseded, or
    /// blacklisted credentials. Always maps to 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to act on this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Brute-force lockout is in effect for this account.
    #[error("Account locked, retry in {retry_after_secs}s")]
    AccountLocked { retry_after_secs: i64 },

    /// The token cache or session store is unreachable. Verification
    /// paths must treat this as a denial, never as a pass.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
