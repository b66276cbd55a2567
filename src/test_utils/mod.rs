//! Test utilities and mock implementations.
//!
//! This module provides reusable mock implementations of domain traits
//! for use in unit and integration tests.

pub mod mocks;

use std::sync::Arc;

use crate::app::{AppState, LoginGuardConfig};
use crate::infra::InMemoryLoginAttemptStore;

pub use mocks::{
    MockConfig, MockPasswordHasher, MockProductRepository, MockTokenIssuer, MockUserRepository,
    mock_repos,
};

/// State backed by empty mocks and the default login policy.
pub fn test_state() -> AppState {
    let (users, products) = mock_repos();
    test_state_with_repos(users, products, LoginGuardConfig::default())
}

pub fn test_state_with(users: Arc<MockUserRepository>, guard: LoginGuardConfig) -> AppState {
    test_state_with_repos(users, Arc::new(MockProductRepository::new()), guard)
}

pub fn test_state_with_repos(
    users: Arc<MockUserRepository>,
    products: Arc<MockProductRepository>,
    guard: LoginGuardConfig,
) -> AppState {
    AppState::new(
        users,
        products,
        Arc::new(MockPasswordHasher::new()),
        Arc::new(MockTokenIssuer::new()),
        Arc::new(InMemoryLoginAttemptStore::with_idle_ttl(guard.lockout_time)),
        guard,
    )
}
