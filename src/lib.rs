//! E-shop Backend
//!
//! REST backend for authentication, user management and a product
//! catalogue, with failed-login throttling and an in-memory listing
//! pipeline for users.
//!
//! # Architecture Overview
//!
//! This crate is organized into four main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  Handlers, routing, bearer auth, OpenAPI     │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  Services, login guard, listing pipeline     │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no I/O)             │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  PostgreSQL, argon2, JWT, attempt counters   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every external capability (record store, password hashing, token
//! issuing, attempt counters) sits behind a trait in [`domain`], so the
//! services in [`app`] run unchanged against the mocks in `test_utils`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eshop_backend::api::create_router;
//! use eshop_backend::app::{AppState, LoginGuardConfig};
//! use eshop_backend::infra::{
//!     Argon2Hasher, InMemoryLoginAttemptStore, JwtConfig, JwtTokenIssuer, PostgresClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
//!     let state = AppState::new(
//!         db.clone(),
//!         db,
//!         Arc::new(Argon2Hasher::new()),
//!         Arc::new(JwtTokenIssuer::new(&JwtConfig::new("secret"))),
//!         Arc::new(InMemoryLoginAttemptStore::new()),
//!         LoginGuardConfig::default(),
//!     );
//!
//!     let router = create_router(Arc::new(state));
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
