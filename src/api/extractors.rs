//! Request extractors that answer malformed input with the JSON error body.
//!
//! axum's own `Json` and `Query` rejections reply in plain text (422 for a
//! body that does not match the target type). These wrappers turn every
//! rejection into [`AppError::Validation`] so clients always see a 400 with
//! the `{"error": {"type", "message"}}` envelope, then run the `validator`
//! rules of the target type.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::domain::{AppError, ValidationError};

/// JSON body, deserialized and validated.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::InvalidFormat(rejection.body_text()))?;

        data.validate()?;
        Ok(ValidatedJson(data))
    }
}

/// Query string, deserialized and validated.
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(data) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ValidationError::InvalidFormat(rejection.body_text()))?;

        data.validate()?;
        Ok(ValidatedQuery(data))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::{get, post},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::{ErrorResponse, ListQuery, LoginRequest};

    async fn echo_login(ValidatedJson(payload): ValidatedJson<LoginRequest>) -> String {
        payload.email
    }

    async fn echo_page(ValidatedQuery(query): ValidatedQuery<ListQuery>) -> String {
        query.page_number.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/login", post(echo_login))
            .route("/page", get(echo_page))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_type(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        error.error.r#type
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let res = app()
            .oneshot(post_json(r#"{"email":"a@x.io","password":"secret123"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_rejections_are_json_bad_requests() {
        for body in [
            r#"{"email":"a@x.io"}"#,
            r#"{"email":"a@x.io","password":42}"#,
            "not json",
            r#"{"email":"nope","password":"secret123"}"#,
        ] {
            let res = app().oneshot(post_json(body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(error_type(res).await, "validation_error");
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .body(Body::from(r#"{"email":"a@x.io","password":"secret123"}"#))
            .unwrap();

        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_type(res).await, "validation_error");
    }

    #[tokio::test]
    async fn test_query_rejections_are_json_bad_requests() {
        for uri in ["/page?page_number=abc", "/page?page_size=0"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let res = app().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(error_type(res).await, "validation_error");
        }

        let req = Request::builder()
            .uri("/page?page_number=3")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
