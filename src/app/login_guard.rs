//! Failed-login throttling.
//!
//! The guard counts consecutive failed logins per identifier (the
//! normalized email). Once an identifier has accumulated
//! `max_failed_attempts` failures, the next failure trips a lockout:
//!
//! - [`LockoutMode::Hold`]: the caller is suspended for the whole lockout
//!   period, the counter is reset, and only then is the request answered
//!   with an error.
//! - [`LockoutMode::Reject`]: the lockout deadline is recorded and the caller
//!   is answered immediately with a retry hint. Attempts arriving before the
//!   deadline are rejected without checking credentials.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::{ConfigError, LoginAttemptStore};

/// How a tripped lockout is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockoutMode {
    /// Hold the request for the lockout period, then fail it.
    #[default]
    Hold,
    /// Fail immediately with a `Retry-After` hint.
    Reject,
}

impl FromStr for LockoutMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(LockoutMode::Hold),
            "reject" => Ok(LockoutMode::Reject),
            other => Err(ConfigError::InvalidValue {
                key: "LOCKOUT_MODE".to_string(),
                message: format!("expected 'hold' or 'reject', got '{other}'"),
            }),
        }
    }
}

/// Login throttling policy.
#[derive(Debug, Clone)]
pub struct LoginGuardConfig {
    pub max_failed_attempts: u32,
    pub lockout_time: Duration,
    pub mode: LockoutMode,
}

impl Default for LoginGuardConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_time: Duration::from_secs(30 * 60),
            mode: LockoutMode::Hold,
        }
    }
}

/// Outcome of recording one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Failed attempt, `remaining` more failures are tolerated.
    Deny { remaining: u32 },
    /// Threshold exceeded; the identifier is locked out for `wait`.
    Lockout { wait: Duration },
}

/// `now + wait`, saturating to a deadline that will not pass while the process runs.
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub struct LoginGuard {
    store: Arc<dyn LoginAttemptStore>,
    config: LoginGuardConfig,
}

impl LoginGuard {
    #[must_use]
    pub fn new(store: Arc<dyn LoginAttemptStore>, config: LoginGuardConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &LoginGuardConfig {
        &self.config
    }

    /// Current failure count for `identifier`.
    pub fn failures(&self, identifier: &str) -> u32 {
        self.store.failures(identifier)
    }

    /// Remaining lockout time when an immediate-rejection lockout is active.
    ///
    /// Always `None` in hold mode. An expired lockout is cleared here, so the
    /// identifier starts again from a zero count.
    pub fn active_lockout(&self, identifier: &str) -> Option<Duration> {
        if self.config.mode != LockoutMode::Reject {
            return None;
        }

        let deadline = self.store.locked_until(identifier)?;
        let now = Instant::now();
        if deadline > now {
            return Some(deadline - now);
        }

        info!(identifier = %identifier, "Lockout expired, resetting failed attempts");
        self.store.reset(identifier);
        None
    }

    /// Records the result of a credentials check.
    pub fn record_attempt(&self, identifier: &str, succeeded: bool) -> GuardDecision {
        if succeeded {
            self.store.reset(identifier);
            return GuardDecision::Allow;
        }

        let previous = self.store.record_failure(identifier);
        let max = self.config.max_failed_attempts;

        if previous >= max {
            warn!(
                identifier = %identifier,
                failed_attempts = previous + 1,
                "Too many failed login attempts, locking out"
            );
            if self.config.mode == LockoutMode::Reject {
                self.store.lock_until(identifier, deadline_after(self.config.lockout_time));
            }
            return GuardDecision::Lockout {
                wait: self.config.lockout_time,
            };
        }

        let remaining = max.saturating_sub(previous + 1);
        info!(
            identifier = %identifier,
            remaining_attempts = remaining,
            "Failed login attempt"
        );
        GuardDecision::Deny { remaining }
    }

    /// Suspends the caller for the lockout period, then clears the counter.
    pub async fn hold(&self, identifier: &str) {
        tokio::time::sleep(self.config.lockout_time).await;
        self.store.reset(identifier);
        info!(
            identifier = %identifier,
            "Lockout period elapsed, failed attempts reset to 0"
        );
    }
}
