use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::common::test_app;

#[tokio::test]
async fn health_reports_not_degraded_when_api_key_is_configured() {
    let app = test_app();
    let req = Request::builder().method("GET").uri("/api/v1/admin/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["degraded"], false);
}
