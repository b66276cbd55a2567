//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{NewUser, Product, TokenClaims, UpdateProductRequest, User};

/// Persistence for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Check store connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// All users in insertion order
    async fn find_all(&self) -> Result<Vec<User>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Lookup by email, compared case-insensitively
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn create(&self, user: &NewUser) -> Result<User, AppError>;

    /// Overwrite name and email. Returns `false` if nothing was updated.
    async fn update_fields(&self, id: &str, name: &str, email: &str) -> Result<bool, AppError>;

    /// Replace the stored password digest. Returns `false` if nothing was updated.
    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, AppError>;

    /// Returns `false` if no record was deleted.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// Persistence for product records.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Product>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, AppError>;

    async fn create(
        &self,
        name: &str,
        price: f64,
        description: &str,
    ) -> Result<Product, AppError>;

    /// Write only the fields that are `Some`. Returns `false` if no record matched.
    async fn update_fields(&self, id: &str, fields: &UpdateProductRequest)
    -> Result<bool, AppError>;

    /// Returns `false` if no record was deleted.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// Password digest capability.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, AppError>;

    /// A malformed digest counts as a mismatch.
    fn matches(&self, plaintext: &str, digest: &str) -> bool;
}

/// Access token capability.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: &str, email: &str) -> Result<String, AppError>;

    fn verify(&self, token: &str) -> Result<TokenClaims, AppError>;
}

/// Keyed failed-login counters.
///
/// Each method is a single atomic step with respect to one identifier:
/// concurrent `record_failure` calls for the same key never lose an increment.
pub trait LoginAttemptStore: Send + Sync {
    /// Current failure count (0 if the identifier was never seen).
    fn failures(&self, identifier: &str) -> u32;

    /// Increments the counter and returns the count *before* the increment.
    fn record_failure(&self, identifier: &str) -> u32;

    fn reset(&self, identifier: &str);

    /// Deadline of an active lockout, if one was set.
    fn locked_until(&self, identifier: &str) -> Option<tokio::time::Instant>;

    fn lock_until(&self, identifier: &str, deadline: tokio::time::Instant);
}
