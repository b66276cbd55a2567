//! HTTP middleware for API layer.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Response, header},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::domain::AppError;

fn bearer_token<B>(request: &Request<B>) -> Option<&str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Bearer token authentication middleware.
///
/// Rejects the request with 401 unless the `Authorization: Bearer` token
/// verifies. Verified claims are inserted into the request extensions.
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let Some(token) = bearer_token(&request) else {
        warn!("Bearer auth failed: missing token");
        return AppError::Authentication("Missing bearer token".to_string()).into_response();
    };

    match state.tokens.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Bearer auth failed: invalid token");
            AppError::Authentication("Invalid or expired token".to_string()).into_response()
        }
    }
}

/// Same as [`require_bearer_token`], but GET and HEAD pass through.
pub async fn require_bearer_token_for_writes(
    state: State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }
    require_bearer_token(state, request, next).await
}
