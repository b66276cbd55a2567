//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, DatabaseError, ValidationError};
pub use traits::{LoginAttemptStore, PasswordHasher, ProductRepository, TokenIssuer, UserRepository};
pub use types::{
    ChangePasswordRequest, CreateProductRequest, CreateUserRequest, EntityId, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, ListQuery, LoginRequest, LoginResponse,
    MessageResponse, MutationOutcome, NewUser, PageResult, Product, ProductMutationResponse,
    RateLimitResponse, TokenClaims, UpdateProductRequest, UpdateUserRequest, User,
    UserIdResponse, UserResponse,
};
