//! Credential lockout accounting.
//!
//! Pure decision logic over the lockout fields carried on a user row
//! (`failed_login_count`, `locked_until`). The repository writes are done
//! by the caller; this module only decides what the new state should be.
//! Lockout expiry is evaluated lazily -- there is no background sweep.

use chrono::Duration;

use crate::types::Timestamp;

/// Lockout thresholds, injected from server configuration.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Consecutive failures before the account is locked.
    pub max_failed_attempts: i32,
    /// How long the account stays locked once the threshold is hit.
    pub lockout_duration_mins: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration_mins: 15,
        }
    }
}

/// Result of registering one failed login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub failed_login_count: i32,
    /// Set when the new count reached the policy threshold.
    pub locked_until: Option<Timestamp>,
}

/// Current lock status of an account, evaluated at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    /// Locked with the remaining window in whole seconds (at least 1).
    Locked { remaining_secs: i64 },
}

impl LockoutPolicy {
    /// Compute the state after one more failed attempt.
    pub fn register_failure(&self, failed_login_count: i32, now: Timestamp) -> FailureOutcome {
        let new_count = failed_login_count + 1;
        let locked_until = (new_count >= self.max_failed_attempts)
            .then(|| now + Duration::minutes(self.lockout_duration_mins));
        FailureOutcome {
            failed_login_count: new_count,
            locked_until,
        }
    }

    /// Evaluate whether the account is currently locked.
    ///
    /// A `locked_until` in the past counts as unlocked; the caller should
    /// clear the stale field on its next write.
    pub fn lock_state(&self, locked_until: Option<Timestamp>, now: Timestamp) -> LockState {
        match locked_until {
            Some(until) if until > now => {
                let remaining = (until - now).num_seconds().max(1);
                LockState::Locked {
                    remaining_secs: remaining,
                }
            }
            _ => LockState::Unlocked,
        }
    }
}
