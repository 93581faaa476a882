//! Interactive action dispatch for `POST /api/v1/actions/hitl-response` (spec.md §4.H, §6).
//! Interprets the `context` map [`notify::hitl`] and [`notify::agent`] attach to each button:
//! `"action"` names the verb, plus an id key (`"workflow_id"` or `"cursor_agent_id"`).

use std::collections::HashMap;

use agent_client::Deadline;
use serde::Deserialize;
use store::WorkflowPhase;

use crate::error::OrchestratorError;
use crate::state::Orchestrator;

const STOP_DEADLINE: std::time::Duration = std::time::Duration::from_secs(15);

/// The body posted back to the action endpoint: the clicked button's context, plus whatever a
/// follow-up dialog submission added (`feedback`, for `"iterate"`).
#[derive(Clone, Debug, Deserialize)]
pub struct ActionRequest {
    pub trigger_id: Option<String>,
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn field<'a>(ctx: &'a HashMap<String, serde_json::Value>, action: &str, key: &'static str) -> Result<&'a str, OrchestratorError> {
    ctx.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| OrchestratorError::MissingActionField { action: action.to_string(), field: key })
}

impl Orchestrator {
    pub async fn handle_action(&self, req: ActionRequest) -> Result<(), OrchestratorError> {
        let action = field(&req.context, "<unknown>", "action")?.to_string();
        match action.as_str() {
            "cancel_agent" => self.handle_cancel_agent(&req).await,
            "accept" | "reject" | "iterate" => self.handle_review_action(&action, &req).await,
            other => Err(OrchestratorError::UnknownAction(other.to_string())),
        }
    }

    async fn handle_cancel_agent(&self, req: &ActionRequest) -> Result<(), OrchestratorError> {
        let cursor_agent_id = field(&req.context, "cancel_agent", "cursor_agent_id")?;
        let _ = self.agent_client.stop_agent(cursor_agent_id, Deadline::after(STOP_DEADLINE)).await;
        self.hitl.cancel_by_agent(cursor_agent_id).await?;
        Ok(())
    }

    /// Accept/reject/iterate apply to whichever HITL stage the workflow is currently in;
    /// `require_phase` inside each `hitl` method rejects a stale click against the wrong stage.
    async fn handle_review_action(&self, action: &str, req: &ActionRequest) -> Result<(), OrchestratorError> {
        let workflow_id = field(&req.context, action, "workflow_id")?.to_string();
        let workflow = self
            .store
            .get_workflow(&workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.clone()))?;

        match (action, workflow.phase) {
            ("accept", WorkflowPhase::ContextReview) => {
                let context = workflow.enriched_context.clone().unwrap_or_else(|| workflow.original_prompt.clone());
                self.hitl.accept_context(&workflow_id, context).await?;
            }
            ("accept", WorkflowPhase::PlanReview) => {
                self.hitl.accept_plan(&workflow_id).await?;
            }
            ("reject", WorkflowPhase::ContextReview) => {
                self.hitl.reject_context(&workflow_id).await?;
            }
            ("reject", WorkflowPhase::PlanReview) => {
                self.hitl.reject_plan(&workflow_id).await?;
            }
            ("iterate", WorkflowPhase::ContextReview) => {
                self.iterate_with_feedback(req, &workflow_id, true).await?;
            }
            ("iterate", WorkflowPhase::PlanReview) => {
                self.iterate_with_feedback(req, &workflow_id, false).await?;
            }
            (action, phase) => {
                tracing::debug!(action, ?phase, workflow_id, "ignored action for current workflow phase");
            }
        }
        Ok(())
    }

    /// `iterate` needs free-text feedback. If the request carries none yet, this is the initial
    /// button click: open a dialog and wait for the submission round trip to arrive with
    /// `feedback` set.
    async fn iterate_with_feedback(&self, req: &ActionRequest, workflow_id: &str, is_context: bool) -> Result<(), OrchestratorError> {
        match &req.feedback {
            Some(feedback) if !feedback.trim().is_empty() => {
                if is_context {
                    self.hitl.iterate_context(workflow_id, feedback).await?;
                } else {
                    self.hitl.iterate_plan(workflow_id, feedback).await?;
                }
                Ok(())
            }
            _ => {
                let Some(trigger_id) = &req.trigger_id else { return Ok(()) };
                let dialog = chat_host::DialogSpec {
                    callback_id: format!("iterate:{workflow_id}"),
                    title: "Request changes".to_string(),
                    elements: vec![chat_host::DialogElement {
                        name: "feedback".to_string(),
                        display_name: "What should change?".to_string(),
                        kind: "textarea".to_string(),
                        default: None,
                    }],
                    submit_label: "Submit".to_string(),
                };
                self.chat_host.open_dialog(trigger_id, dialog).await?;
                Ok(())
            }
        }
    }
}
