//! Request flows that span several endpoints: login throttling and the
//! full user lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use eshop_backend::api::create_router;
use eshop_backend::app::{LockoutMode, LoginGuardConfig};
use eshop_backend::domain::{
    ErrorResponse, LoginRequest, LoginResponse, UserIdResponse, UserResponse,
};
use eshop_backend::test_utils::{MockTokenIssuer, MockUserRepository, test_state_with};

fn guarded_router(users: Arc<MockUserRepository>, mode: LockoutMode, lockout: Duration) -> Router {
    let guard = LoginGuardConfig {
        max_failed_attempts: 3,
        lockout_time: lockout,
        mode,
    };
    create_router(Arc::new(test_state_with(users, guard)))
}

fn login_request(email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/authentication/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_string(&LoginRequest::new(email, password)).unwrap(),
        ))
        .unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    error.error.message
}

#[tokio::test]
async fn test_login_success_returns_token() {
    let users = Arc::new(MockUserRepository::new());
    let id = users.seed("Anna", "anna@example.com", "secret123");
    let router = guarded_router(users, LockoutMode::Hold, Duration::from_secs(60));

    let response = router
        .oneshot(login_request("anna@example.com", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let login: LoginResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(login.user_id, id);
    assert_eq!(login.name, "Anna");
    assert_eq!(login.token, format!("token-{id}:anna@example.com"));
}

#[tokio::test]
async fn test_wrong_password_reports_remaining_attempts() {
    let users = Arc::new(MockUserRepository::new());
    users.seed("Anna", "anna@example.com", "secret123");
    let router = guarded_router(users, LockoutMode::Hold, Duration::from_secs(60));

    for remaining in [2, 1, 0] {
        let response = router
            .clone()
            .oneshot(login_request("anna@example.com", "nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let message = error_message(response).await;
        assert!(
            message.contains(&format!("Remaining attempts: {remaining}")),
            "{message}"
        );
    }
}

#[tokio::test]
async fn test_unknown_email_is_indistinguishable() {
    let router = guarded_router(
        Arc::new(MockUserRepository::new()),
        LockoutMode::Hold,
        Duration::from_secs(60),
    );

    let response = router
        .oneshot(login_request("ghost@example.com", "whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(
        error_message(response)
            .await
            .contains("Invalid email or password")
    );
}

#[tokio::test]
async fn test_invalid_login_payload_is_bad_request() {
    let router = guarded_router(
        Arc::new(MockUserRepository::new()),
        LockoutMode::Hold,
        Duration::from_secs(60),
    );

    let response = router
        .oneshot(login_request("not-an-email", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_hold_mode_outlasts_request_timeout() {
    let users = Arc::new(MockUserRepository::new());
    users.seed("Anna", "anna@example.com", "secret123");
    // Longer than the 30s timeout applied to the other routes.
    let router = guarded_router(users, LockoutMode::Hold, Duration::from_secs(60));

    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(login_request("anna@example.com", "nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let started = tokio::time::Instant::now();
    let response = router
        .clone()
        .oneshot(login_request("anna@example.com", "nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    assert!(started.elapsed() >= Duration::from_secs(60));

    // The counter was reset once the hold ended.
    let response = router
        .oneshot(login_request("anna@example.com", "nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(
        error_message(response)
            .await
            .contains("Remaining attempts: 2")
    );
}

#[tokio::test(start_paused = true)]
async fn test_reject_mode_sets_retry_after() {
    let users = Arc::new(MockUserRepository::new());
    users.seed("Anna", "anna@example.com", "secret123");
    let router = guarded_router(users, LockoutMode::Reject, Duration::from_secs(120));

    for _ in 0..3 {
        router
            .clone()
            .oneshot(login_request("anna@example.com", "nope"))
            .await
            .unwrap();
    }

    let response = router
        .clone()
        .oneshot(login_request("anna@example.com", "nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "120"
    );

    // Correct credentials are refused while the lockout is active.
    let response = router
        .clone()
        .oneshot(login_request("ANNA@example.com", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());

    tokio::time::advance(Duration::from_secs(121)).await;

    let response = router
        .oneshot(login_request("anna@example.com", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_full_user_lifecycle_flow() {
    let users = Arc::new(MockUserRepository::new());
    let router = guarded_router(users, LockoutMode::Hold, Duration::from_secs(60));
    let bearer = format!("Bearer {}", MockTokenIssuer::valid_token());

    let send = |method: &str, uri: String, body: serde_json::Value| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    // 1. Register
    let response = router
        .clone()
        .oneshot(send(
            "POST",
            "/users".to_string(),
            serde_json::json!({
                "name": "Anna",
                "email": "anna@example.com",
                "password": "secret123",
                "password_confirm": "secret123"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let created: UserResponse = serde_json::from_slice(&bytes).unwrap();

    // 2. Log in with the original password
    let response = router
        .clone()
        .oneshot(login_request("anna@example.com", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 3. Change the password
    let response = router
        .clone()
        .oneshot(send(
            "POST",
            format!("/users/{}/change-password", created.id),
            serde_json::json!({
                "password_old": "secret123",
                "password_new": "secret456",
                "password_confirm": "secret456"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let ack: UserIdResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack.id, created.id);

    // 4. Old password no longer works, new one does
    let response = router
        .clone()
        .oneshot(login_request("anna@example.com", "secret123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(login_request("anna@example.com", "secret456"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 5. Delete, then the account is gone
    let response = router
        .clone()
        .oneshot(send(
            "DELETE",
            format!("/users/{}", created.id),
            serde_json::Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(login_request("anna@example.com", "secret456"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
