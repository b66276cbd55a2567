//! Login flow: credentials check, throttling, token issuing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, LoginRequest, LoginResponse, PasswordHasher, TokenIssuer, User, UserRepository,
};
use crate::infra::observability::{LOGIN_ATTEMPTS_TOTAL, LOGIN_LOCKOUTS_TOTAL};

use super::login_guard::{GuardDecision, LockoutMode, LoginGuard};

/// Verified against when the email is unknown, so both miss paths cost one hash check.
const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-accounts";

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    guard: LoginGuard,
    dummy_digest: String,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        guard: LoginGuard,
    ) -> Self {
        let dummy_digest = hasher.hash(DUMMY_PASSWORD).unwrap_or_default();
        Self {
            users,
            hasher,
            tokens,
            guard,
            dummy_digest,
        }
    }

    #[must_use]
    pub fn guard(&self) -> &LoginGuard {
        &self.guard
    }

    /// Looks the user up by email and verifies the password.
    ///
    /// Returns `None` for an unknown email or a wrong password. Store errors
    /// propagate.
    #[instrument(skip(self, password))]
    pub async fn check_login_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let user = self.users.find_by_email(email).await?;
        let digest = user
            .as_ref()
            .map_or(self.dummy_digest.as_str(), |u| u.password.as_str());

        let matched = self.hasher.matches(password, digest);
        Ok(user.filter(|_| matched))
    }

    /// Authenticates a login request and issues an access token.
    ///
    /// # Errors
    /// - `InvalidCredentials` with the number of attempts left
    /// - `TooManyFailedAttempts` once the failure threshold is exceeded
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        request.validate()?;
        let identifier = normalize_identifier(&request.email);

        if let Some(wait) = self.guard.active_lockout(&identifier) {
            metrics::counter!(LOGIN_ATTEMPTS_TOTAL, "outcome" => "locked_out").increment(1);
            warn!(identifier = %identifier, "Login attempt rejected during lockout");
            return Err(too_many_failed_attempts(Some(wait)));
        }

        let Some(user) = self
            .check_login_credentials(&request.email, &request.password)
            .await?
        else {
            return Err(self.on_failure(&identifier).await);
        };

        self.guard.record_attempt(&identifier, true);
        let token = self.tokens.issue(&user.id, &user.email)?;

        metrics::counter!(LOGIN_ATTEMPTS_TOTAL, "outcome" => "success").increment(1);
        info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            email: user.email,
            name: user.name,
            user_id: user.id,
            token,
        })
    }

    async fn on_failure(&self, identifier: &str) -> AppError {
        match self.guard.record_attempt(identifier, false) {
            GuardDecision::Deny { remaining } => {
                metrics::counter!(LOGIN_ATTEMPTS_TOTAL, "outcome" => "denied").increment(1);
                AppError::InvalidCredentials(format!(
                    "Invalid email or password. Remaining attempts: {remaining}"
                ))
            }
            GuardDecision::Lockout { wait } => {
                metrics::counter!(LOGIN_ATTEMPTS_TOTAL, "outcome" => "locked_out").increment(1);
                metrics::counter!(LOGIN_LOCKOUTS_TOTAL).increment(1);
                match self.guard.config().mode {
                    LockoutMode::Hold => {
                        self.guard.hold(identifier).await;
                        too_many_failed_attempts(None)
                    }
                    LockoutMode::Reject => too_many_failed_attempts(Some(wait)),
                }
            }
            GuardDecision::Allow => {
                AppError::InvalidCredentials("Invalid email or password".to_string())
            }
        }
    }
}

/// Attempt counters are keyed by the trimmed, lowercased email.
#[must_use]
pub fn normalize_identifier(email: &str) -> String {
    email.trim().to_lowercase()
}

fn too_many_failed_attempts(retry_after: Option<Duration>) -> AppError {
    let message = match retry_after {
        Some(wait) => format!(
            "Too many failed login attempts. Try again in {} seconds",
            wait.as_secs().max(1)
        ),
        None => "Too many failed login attempts. Please try again".to_string(),
    };
    AppError::TooManyFailedAttempts {
        message,
        retry_after,
    }
}
