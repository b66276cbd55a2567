//! Concrete record store implementations.
//!
//! This module contains the production database adapter that implements
//! the `UserRepository` and `ProductRepository` traits from the domain layer.

pub mod postgres;

pub use postgres::{PostgresClient, PostgresConfig};
