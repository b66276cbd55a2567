//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate various scenarios including
//! success, failure, and edge cases.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{
    AppError, DatabaseError, NewUser, PasswordHasher, Product, ProductRepository, TokenClaims,
    TokenIssuer, UpdateProductRequest, User, UserRepository,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, every operation fails.
    pub should_fail: bool,
    /// If true, only create/update/delete fail; reads succeed.
    pub fail_writes: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates a config whose reads succeed and whose writes fail.
    #[must_use]
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            error_message: Some("Mock write refused".to_string()),
            ..Self::default()
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
}

/// Shared bookkeeping for the repository mocks.
struct MockControl {
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockControl {
    fn new(config: MockConfig) -> Self {
        Self {
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    fn error(&self) -> AppError {
        let msg = self
            .config
            .error_message
            .clone()
            .unwrap_or_else(|| "Mock database error".to_string());
        AppError::Database(DatabaseError::Query(msg))
    }

    async fn read(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(ms) = self.config.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.config.should_fail {
            return Err(self.error());
        }
        Ok(())
    }

    async fn write(&self) -> Result<(), AppError> {
        self.read().await?;
        if self.config.fail_writes {
            return Err(self.error());
        }
        Ok(())
    }

    fn health(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }
        if self.config.should_fail {
            return Err(self.error());
        }
        Ok(())
    }
}

/// Mock user store for testing.
///
/// Keeps users in a `Vec` so listing returns them in insertion order.
///
/// # Example
///
/// ```
/// use eshop_backend::test_utils::{MockConfig, MockUserRepository};
///
/// let mock = MockUserRepository::new();
/// let id = mock.seed("Anna", "anna@example.com", "secret123");
/// assert_eq!(mock.all_users()[0].id, id);
///
/// let failing = MockUserRepository::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockUserRepository {
    storage: Mutex<Vec<User>>,
    control: MockControl,
}

impl MockUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Mutex::new(Vec::new()),
            control: MockControl::new(config),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Inserts a user directly, hashing `password` with [`MockPasswordHasher`].
    pub fn seed(&self, name: &str, email: &str, password: &str) -> String {
        let user = User::new(
            format!("user_{}", uuid::Uuid::new_v4()),
            name.to_string(),
            email.to_string(),
            MockPasswordHasher::digest(password),
        );
        let id = user.id.clone();
        self.storage.lock().unwrap().push(user);
        id
    }

    pub fn call_count(&self) -> u64 {
        self.control.call_count.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.control.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn all_users(&self) -> Vec<User> {
        self.storage.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.storage.lock().unwrap().clear();
    }
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        self.control.health()
    }

    async fn find_all(&self) -> Result<Vec<User>, AppError> {
        self.control.read().await?;
        Ok(self.all_users())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.control.read().await?;
        let storage = self.storage.lock().unwrap();
        Ok(storage.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.control.read().await?;
        let storage = self.storage.lock().unwrap();
        Ok(storage
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<User, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        if storage
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Database(DatabaseError::Duplicate(
                user.email.clone(),
            )));
        }

        let record = User::new(
            format!("user_{}", uuid::Uuid::new_v4()),
            user.name.clone(),
            user.email.clone(),
            user.password_hash.clone(),
        );
        storage.push(record.clone());
        Ok(record)
    }

    async fn update_fields(&self, id: &str, name: &str, email: &str) -> Result<bool, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        Ok(match storage.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.name = name.to_string();
                user.email = email.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        Ok(match storage.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        let before = storage.len();
        storage.retain(|u| u.id != id);
        Ok(storage.len() < before)
    }
}

/// Mock product store for testing.
pub struct MockProductRepository {
    storage: Mutex<Vec<Product>>,
    control: MockControl,
}

impl MockProductRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Mutex::new(Vec::new()),
            control: MockControl::new(config),
        }
    }

    pub fn seed(&self, name: &str, price: f64, description: &str) -> String {
        let product = Product {
            id: format!("product_{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            price,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        let id = product.id.clone();
        self.storage.lock().unwrap().push(product);
        id
    }

    pub fn call_count(&self) -> u64 {
        self.control.call_count.load(Ordering::Relaxed)
    }

    pub fn all_products(&self) -> Vec<Product> {
        self.storage.lock().unwrap().clone()
    }
}

impl Default for MockProductRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRepository for MockProductRepository {
    async fn find_all(&self) -> Result<Vec<Product>, AppError> {
        self.control.read().await?;
        Ok(self.all_products())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, AppError> {
        self.control.read().await?;
        let storage = self.storage.lock().unwrap();
        Ok(storage.iter().find(|p| p.id == id).cloned())
    }

    async fn create(
        &self,
        name: &str,
        price: f64,
        description: &str,
    ) -> Result<Product, AppError> {
        self.control.write().await?;

        let product = Product {
            id: format!("product_{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            price,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.storage.lock().unwrap().push(product.clone());
        Ok(product)
    }

    async fn update_fields(
        &self,
        id: &str,
        fields: &UpdateProductRequest,
    ) -> Result<bool, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        let Some(product) = storage.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        if let Some(name) = &fields.name {
            product.name = name.clone();
        }
        if let Some(price) = fields.price {
            product.price = price;
        }
        if let Some(description) = &fields.description {
            product.description = description.clone();
        }
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.control.write().await?;

        let mut storage = self.storage.lock().unwrap();
        let before = storage.len();
        storage.retain(|p| p.id != id);
        Ok(storage.len() < before)
    }
}

/// Reversible "hash" for fast tests: `mock-hash:<plaintext>`.
#[derive(Debug, Default, Clone)]
pub struct MockPasswordHasher {
    fail: bool,
}

impl MockPasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A hasher whose `hash` always errors.
    #[must_use]
    pub fn failing() -> Self {
        Self { fail: true }
    }

    #[must_use]
    pub fn digest(plaintext: &str) -> String {
        format!("mock-hash:{plaintext}")
    }
}

impl PasswordHasher for MockPasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        if self.fail {
            return Err(AppError::PasswordHash("Mock hashing failure".to_string()));
        }
        Ok(Self::digest(plaintext))
    }

    fn matches(&self, plaintext: &str, digest: &str) -> bool {
        digest == Self::digest(plaintext)
    }
}

/// Tokens of the form `token-<user_id>:<email>`.
#[derive(Debug, Default, Clone)]
pub struct MockTokenIssuer;

impl MockTokenIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// A token that [`MockTokenIssuer::verify`] accepts.
    #[must_use]
    pub fn valid_token() -> String {
        "token-tester:tester@example.com".to_string()
    }
}

impl TokenIssuer for MockTokenIssuer {
    fn issue(&self, user_id: &str, email: &str) -> Result<String, AppError> {
        Ok(format!("token-{user_id}:{email}"))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        let (sub, email) = token
            .strip_prefix("token-")
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(|| AppError::Authentication("Invalid token".to_string()))?;
        let iat = Utc::now().timestamp();
        Ok(TokenClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            iat,
            exp: iat + 3600,
        })
    }
}

/// Convenience for wiring every mock together.
pub fn mock_repos() -> (Arc<MockUserRepository>, Arc<MockProductRepository>) {
    (
        Arc::new(MockUserRepository::new()),
        Arc::new(MockProductRepository::new()),
    )
}
