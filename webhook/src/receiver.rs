//! Webhook receiver (spec.md §4.E, §6 `POST /api/v1/webhooks/<platform>`).

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use store::Store;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::WebhookError;
use crate::event::WebhookEvent;
use crate::signature;

fn to_status(err: &WebhookError) -> StatusCode {
    match err {
        WebhookError::SignatureMismatch => StatusCode::UNAUTHORIZED,
        WebhookError::MissingSecret => StatusCode::INTERNAL_SERVER_ERROR,
        WebhookError::BodyTooLarge | WebhookError::Unparseable(_) => StatusCode::BAD_REQUEST,
        WebhookError::Store(_) => StatusCode::OK, // best-effort: logged, dispatch still proceeds
    }
}

/// Body size cap (spec.md §4.E step 1, §5 "webhook body capped at 1 MiB").
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[async_trait]
pub trait WebhookDispatch: Send + Sync {
    /// Runs the handler registered for `event`. The returned status is recorded by the
    /// receiver: only a `2xx` result marks the delivery processed (spec.md §4.E step 5).
    async fn dispatch(&self, event: WebhookEvent) -> StatusCode;
}

#[derive(Clone)]
pub struct ReceiverState {
    pub store: Arc<Store>,
    pub dispatch: Arc<dyn WebhookDispatch>,
    pub webhook_secret: Option<String>,
}

pub fn router(state: ReceiverState, platform: &str) -> Router {
    Router::new()
        .route(&format!("/api/v1/webhooks/{platform}"), post(handle))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn handle(State(state): State<ReceiverState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if body.len() > MAX_BODY_BYTES {
        return to_status(&WebhookError::BodyTooLarge);
    }

    let Some(secret) = state.webhook_secret.as_deref() else {
        tracing::error!("webhook received with no configured secret");
        return to_status(&WebhookError::MissingSecret);
    };

    let Some(signature_header) = headers.get("X-Signature-SHA256").and_then(|v| v.to_str().ok()) else {
        return to_status(&WebhookError::SignatureMismatch);
    };
    if !signature::verify(&body, signature_header, secret) {
        return to_status(&WebhookError::SignatureMismatch);
    }

    let delivery_id = headers.get("X-Delivery-ID").and_then(|v| v.to_str().ok()).map(str::to_string);
    if let Some(id) = &delivery_id {
        match state.store.is_delivery_processed(id).await {
            Ok(true) => return StatusCode::OK,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %WebhookError::Store(e), "delivery idempotency lookup failed, proceeding best-effort");
            }
        }
    }

    let Some(event_type) = headers.get("X-Event-Type").and_then(|v| v.to_str().ok()) else {
        return to_status(&WebhookError::Unparseable("missing X-Event-Type header".to_string()));
    };
    let event = match WebhookEvent::parse(event_type, &body) {
        Ok(event) => event,
        Err(e) => {
            let err = WebhookError::Unparseable(e.to_string());
            tracing::warn!(error = %err, event_type, "unparseable webhook body");
            return to_status(&err);
        }
    };

    let status = state.dispatch.dispatch(event).await;

    if status.is_success() {
        if let Some(id) = &delivery_id {
            if let Err(e) = state.store.mark_delivery_processed(id).await {
                tracing::warn!(error = %e, "failed to persist delivery idempotency marker");
            }
        }
    }

    status
}
