//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use tracing::warn;

use crate::domain::{
    HealthResponse, HealthStatus, LoginAttemptStore, PasswordHasher, ProductRepository,
    TokenIssuer, UserRepository,
};
use crate::infra::PrometheusHandle;

use super::auth_service::AuthService;
use super::login_guard::{LoginGuard, LoginGuardConfig};
use super::product_service::ProductService;
use super::user_service::UserService;

/// Shared application state for the Axum web server.
///
/// Services are built once from the injected trait objects, so handlers
/// never see a concrete store, hasher or token implementation.
///
/// # Example
///
/// ```ignore
/// let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
/// let state = AppState::new(
///     db.clone(),
///     db,
///     Arc::new(Argon2Hasher::new()),
///     Arc::new(JwtTokenIssuer::new(&jwt_config)),
///     Arc::new(InMemoryLoginAttemptStore::new()),
///     LoginGuardConfig::default(),
/// );
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,

    /// Used by the bearer-token middleware.
    pub tokens: Arc<dyn TokenIssuer>,

    /// Used by the health endpoints.
    pub user_repo: Arc<dyn UserRepository>,

    /// Renders `GET /metrics`; `None` when no recorder is installed.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        product_repo: Arc<dyn ProductRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        attempts: Arc<dyn LoginAttemptStore>,
        guard_config: LoginGuardConfig,
    ) -> Self {
        let guard = LoginGuard::new(attempts, guard_config);
        let auth = AuthService::new(
            Arc::clone(&user_repo),
            Arc::clone(&hasher),
            Arc::clone(&tokens),
            guard,
        );

        Self {
            auth: Arc::new(auth),
            users: Arc::new(UserService::new(Arc::clone(&user_repo), hasher)),
            products: Arc::new(ProductService::new(product_repo)),
            tokens,
            user_repo,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Option<Arc<PrometheusHandle>>) -> Self {
        self.metrics = handle;
        self
    }

    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.user_repo.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };
        HealthResponse::new(database)
    }
}
