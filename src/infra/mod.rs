//! Infrastructure layer implementations.

pub mod attempts;
pub mod database;
pub mod observability;
pub mod password;
pub mod token;

pub use attempts::InMemoryLoginAttemptStore;
pub use database::{PostgresClient, PostgresConfig};
pub use observability::{LogFormat, PrometheusHandle};
pub use password::Argon2Hasher;
pub use token::{JwtConfig, JwtTokenIssuer};
