//! Axum router: REST surface plus the mounted webhook endpoint (spec.md §6).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use orchestrator::Orchestrator;
use webhook::ReceiverState;

use crate::routes;

/// Builds the full app router. `platform` names the source-hosting platform segment in
/// `POST /api/v1/webhooks/<platform>` (e.g. `"github"`).
pub fn router(orchestrator: Arc<Orchestrator>, webhook_state: ReceiverState, platform: &str) -> Router {
    let api = Router::new()
        .route("/agents", get(routes::list_agents))
        .route("/agents/:id", get(routes::get_agent))
        .route("/agents/:id/followup", post(routes::followup_agent))
        .route("/agents/:id/cancel", post(routes::cancel_agent))
        .route("/agents/:id/archive", post(routes::archive_agent))
        .route("/agents/:id/unarchive", post(routes::unarchive_agent))
        .route("/actions/hitl-response", post(routes::hitl_response))
        .route("/workflows/:id", get(routes::get_workflow))
        .route("/review-loops/:id", get(routes::get_review_loop))
        .route("/admin/health", get(routes::health))
        .route("/dialog/settings", post(routes::dialog_settings))
        .route("/events/post-created", post(routes::post_created))
        .with_state(orchestrator);

    Router::new()
        .nest("/api/v1", api)
        .merge(webhook::router(webhook_state, platform))
}
