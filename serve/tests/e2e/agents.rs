use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::common::test_app;

#[tokio::test]
async fn get_unknown_agent_is_not_found() {
    let app = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/agents/missing")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_agents_without_user_header_is_unauthorized() {
    let app = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/agents")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_agents_with_user_header_returns_empty_array() {
    let app = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/agents")
        .header("X-User-Id", "u1")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"[]");
}

#[tokio::test]
async fn cancel_unknown_agent_is_not_found() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/agents/missing/cancel")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
