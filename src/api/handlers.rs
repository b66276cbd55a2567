//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use tracing::error;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::extractors::{ValidatedJson, ValidatedQuery};
use crate::app::AppState;
use crate::domain::{
    AppError, ChangePasswordRequest, CreateProductRequest, CreateUserRequest, DatabaseError,
    ErrorDetail, ErrorResponse, HealthResponse, HealthStatus, ListQuery, LoginRequest,
    LoginResponse, MessageResponse, MutationOutcome, PageResult, Product,
    ProductMutationResponse, RateLimitResponse, UpdateProductRequest, UpdateUserRequest,
    UserIdResponse, UserResponse,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token returned by POST /authentication/login"))
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "E-shop Backend API",
        version = "0.1.0",
        description = "Authentication with login throttling, user management and product catalogue",
        license(
            name = "MIT"
        )
    ),
    paths(
        login_handler,
        list_users_handler,
        create_user_handler,
        get_user_handler,
        update_user_handler,
        delete_user_handler,
        change_password_handler,
        list_products_handler,
        get_product_handler,
        create_product_handler,
        update_product_handler,
        delete_product_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            CreateUserRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            UserResponse,
            UserIdResponse,
            PageResult<UserResponse>,
            Product,
            CreateProductRequest,
            UpdateProductRequest,
            ProductMutationResponse,
            MessageResponse,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            RateLimitResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Login and token issuing"),
        (name = "users", description = "User management endpoints"),
        (name = "eshop", description = "Product catalogue endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Maps a mutation sentinel to `NotFound` / `Unprocessable`.
fn require_done(outcome: MutationOutcome, entity: &str, action: &str) -> Result<(), AppError> {
    match outcome {
        MutationOutcome::Done => Ok(()),
        MutationOutcome::NotFound => Err(AppError::NotFound(format!("Unknown {entity}"))),
        MutationOutcome::Failed => {
            Err(AppError::Unprocessable(format!("Failed to {action} {entity}")))
        }
    }
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Wrong email or password", body = ErrorResponse),
        (status = 403, description = "Too many failed login attempts", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state.auth.login(&payload).await?;
    Ok(Json(response))
}

/// List users with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(ListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "One page of users", body = PageResult<UserResponse>),
        (status = 400, description = "Invalid listing parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> Result<Json<PageResult<UserResponse>>, AppError> {
    let page = state.users.get_users(&query).await?;
    Ok(Json(page))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Failed to create user", body = ErrorResponse)
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .create_user(&payload)
        .await?
        .ok_or_else(|| AppError::Unprocessable("Failed to create user".to_string()))?;
    Ok(Json(user))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown user".to_string()))?;
    Ok(Json(user))
}

/// Update a user's name and email
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User updated", body = UserIdResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Failed to update user", body = ErrorResponse)
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserIdResponse>, AppError> {
    let outcome = state.users.update_user(&id, &payload).await?;
    require_done(outcome, "user", "update")?;
    Ok(Json(UserIdResponse { id }))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User deleted", body = UserIdResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Failed to delete user", body = ErrorResponse)
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserIdResponse>, AppError> {
    let outcome = state.users.delete_user(&id).await?;
    require_done(outcome, "user", "delete")?;
    Ok(Json(UserIdResponse { id }))
}

/// Change a user's password
#[utoipa::path(
    post,
    path = "/users/{id}/change-password",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = ChangePasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Password changed", body = UserIdResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Wrong old password", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Failed to change password", body = ErrorResponse)
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<UserIdResponse>, AppError> {
    let outcome = state.users.change_password(&id, &payload).await?;
    require_done(outcome, "user", "change password of")?;
    Ok(Json(UserIdResponse { id }))
}

/// List all products
#[utoipa::path(
    get,
    path = "/eshop/products",
    tag = "eshop",
    responses(
        (status = 200, description = "All products", body = [Product])
    )
)]
pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.get_products().await?))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/eshop/products/{id}",
    tag = "eshop",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn get_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .products
        .get_product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown product".to_string()))?;
    Ok(Json(product))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/eshop/products",
    tag = "eshop",
    request_body = CreateProductRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Product created", body = ProductMutationResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 422, description = "Failed to create product", body = ErrorResponse)
    )
)]
pub async fn create_product_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<CreateProductRequest>,
) -> Result<Json<ProductMutationResponse>, AppError> {
    let outcome = state.products.create_product(&payload).await?;
    require_done(outcome, "product", "create")?;
    Ok(Json(ProductMutationResponse {
        name: Some(payload.name),
        price: Some(payload.price),
        description: payload.description,
        message: None,
    }))
}

/// Update the provided fields of a product
#[utoipa::path(
    put,
    path = "/eshop/products/{id}",
    tag = "eshop",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Product updated", body = ProductMutationResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 422, description = "Failed to update product", body = ErrorResponse)
    )
)]
pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<ProductMutationResponse>, AppError> {
    let outcome = state.products.update_product(&id, &payload).await?;
    require_done(outcome, "product", "update")?;
    Ok(Json(ProductMutationResponse {
        name: payload.name,
        price: payload.price,
        description: payload.description,
        message: Some("Product updated successfully".to_string()),
    }))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/eshop/products/{id}",
    tag = "eshop",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 422, description = "Failed to delete product", body = ErrorResponse)
    )
)]
pub async fn delete_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let outcome = state.products.delete_product(&id).await?;
    require_done(outcome, "product", "delete")?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully".to_string(),
    }))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.health_check().await)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.health_check().await.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let retry_after = match &self {
            AppError::TooManyFailedAttempts {
                retry_after: Some(wait),
                ..
            } => Some(retry_after_secs(*wait)),
            _ => None,
        };

        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) | DatabaseError::PoolExhausted(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::InvalidCredentials(_) => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::TooManyFailedAttempts { .. } => (
                StatusCode::FORBIDDEN,
                "too_many_failed_login_attempts",
                self.to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Unprocessable(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable_entity",
                self.to_string(),
            ),
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            AppError::PasswordHash(_) | AppError::Token(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
