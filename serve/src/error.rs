//! Maps [`orchestrator::OrchestratorError`] (and the handlers' own not-found/auth checks) onto
//! the REST surface's status codes (spec.md §6, §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde_json::json;

pub enum ApiError {
    Orchestrator(OrchestratorError),
    NotFound(String),
    Unauthorized(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self::Orchestrator(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Orchestrator(err) => {
                let status = match err {
                    OrchestratorError::AgentNotFound(_) | OrchestratorError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
                    OrchestratorError::NoRepository | OrchestratorError::UnknownAction(_) | OrchestratorError::MissingActionField { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
