//! REST surface handlers (spec.md §6). Mounted under `/api/v1` by [`crate::app::router`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chat_host::PostCreatedEvent;
use orchestrator::{ActionRequest, Orchestrator};
use serde::{Deserialize, Serialize};
use store::{ChannelSettings, UserSettings};

use crate::error::ApiError;

/// The host-provided user-id header authenticated routes key off of (spec.md §6).
const USER_ID_HEADER: &str = "X-User-Id";

fn user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized(format!("missing {USER_ID_HEADER} header")))
}

pub async fn list_agents(State(orch): State<Arc<Orchestrator>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;
    let agents = orch.list_agents(user_id).await?;
    Ok(Json(agents))
}

pub async fn get_agent(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match orch.get_agent(&id).await? {
        Some(agent) => Ok(Json(agent)),
        None => Err(ApiError::not_found(format!("agent {id} not found"))),
    }
}

#[derive(Deserialize)]
pub struct FollowupBody {
    pub prompt: String,
}

pub async fn followup_agent(
    State(orch): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
    Json(body): Json<FollowupBody>,
) -> Result<impl IntoResponse, ApiError> {
    orch.followup_agent(&id, &body.prompt).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_agent(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    orch.cancel_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive_agent(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    orch.archive_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unarchive_agent(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    orch.unarchive_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_workflow(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match orch.get_workflow(&id).await? {
        Some(workflow) => Ok(Json(workflow)),
        None => Err(ApiError::not_found(format!("workflow {id} not found"))),
    }
}

pub async fn get_review_loop(State(orch): State<Arc<Orchestrator>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match orch.get_review_loop(&id).await? {
        Some(review_loop) => Ok(Json(review_loop)),
        None => Err(ApiError::not_found(format!("review loop {id} not found"))),
    }
}

pub async fn hitl_response(
    State(orch): State<Arc<Orchestrator>>,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    orch.handle_action(req).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SettingsBody {
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub channel: Option<ChannelSettings>,
    #[serde(default)]
    pub user: Option<UserSettings>,
}

pub async fn dialog_settings(
    State(orch): State<Arc<Orchestrator>>,
    Json(body): Json<SettingsBody>,
) -> Result<impl IntoResponse, ApiError> {
    orch.save_settings(&body.channel_id, &body.user_id, body.channel, body.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The host's post-created callback (spec.md §6 "Chat event surface"), delivered over HTTP here
/// since this crate is the only transport boundary this workspace owns.
pub async fn post_created(
    State(orch): State<Arc<Orchestrator>>,
    Json(event): Json<PostCreatedEvent>,
) -> Result<impl IntoResponse, ApiError> {
    orch.handle_post_created(event).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub degraded: bool,
}

pub async fn health() -> Json<HealthResponse> {
    let cfg = config::global();
    Json(HealthResponse { status: "ok", degraded: cfg.is_degraded() })
}
