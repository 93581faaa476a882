use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::common::test_app;

#[tokio::test]
async fn hitl_response_with_unknown_action_is_bad_request() {
    let app = test_app();
    let body = serde_json::json!({
        "trigger_id": null,
        "context": { "action": "not_a_real_action" },
        "feedback": null,
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/actions/hitl-response")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hitl_response_with_unknown_workflow_is_not_found() {
    let app = test_app();
    let body = serde_json::json!({
        "trigger_id": null,
        "context": { "action": "accept", "workflow_id": "missing" },
        "feedback": null,
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/actions/hitl-response")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
