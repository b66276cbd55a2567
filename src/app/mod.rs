//! Application layer containing business logic and shared state.

pub mod auth_service;
pub mod listing;
pub mod login_guard;
pub mod product_service;
pub mod state;
pub mod user_service;

pub use auth_service::AuthService;
pub use listing::{ListParams, Listable};
pub use login_guard::{GuardDecision, LockoutMode, LoginGuard, LoginGuardConfig};
pub use product_service::ProductService;
pub use state::AppState;
pub use user_service::UserService;
