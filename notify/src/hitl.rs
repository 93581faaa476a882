//! HITL workflow attachments: context-review and plan-review stages, each with
//! Accept / Reject / Iterate controls (spec.md §4.H).

use std::collections::HashMap;

use chat_host::{Attachment, AttachmentAction};
use store::HitlWorkflow;

fn action(id: &str, name: &str, workflow_id: &str) -> AttachmentAction {
    let mut context = HashMap::new();
    context.insert("action".to_string(), serde_json::Value::String(id.to_string()));
    context.insert("workflow_id".to_string(), serde_json::Value::String(workflow_id.to_string()));
    AttachmentAction {
        id: id.to_string(),
        name: name.to_string(),
        integration_url: "/api/v1/actions/hitl-response".to_string(),
        context,
    }
}

fn review_actions(workflow_id: &str) -> Vec<AttachmentAction> {
    vec![
        action("accept", "Accept", workflow_id),
        action("reject", "Reject", workflow_id),
        action("iterate", "Iterate", workflow_id),
    ]
}

pub fn context_review_attachment(workflow: &HitlWorkflow) -> Attachment {
    let context = workflow.enriched_context.as_deref().unwrap_or(&workflow.original_prompt);
    Attachment {
        text: format!("**Gathered context:**\n\n{context}"),
        pretext: Some(":mag: Review the gathered context before planning begins".to_string()),
        color: Some("#4a90d9".to_string()),
        actions: review_actions(&workflow.id),
    }
}

pub fn plan_review_attachment(workflow: &HitlWorkflow) -> Attachment {
    let plan = workflow.retrieved_plan.as_deref().unwrap_or("(no plan returned)");
    Attachment {
        text: format!("**Proposed plan** (iteration {}):\n\n{plan}", workflow.plan_iteration_count),
        pretext: Some(":clipboard: Review the plan before implementation begins".to_string()),
        color: Some("#4a90d9".to_string()),
        actions: review_actions(&workflow.id),
    }
}

pub fn pending_feedback_ack_attachment() -> Attachment {
    Attachment {
        text: "Your feedback has been queued and will be applied to the next planning iteration.".to_string(),
        pretext: None,
        color: Some("#8c8c8c".to_string()),
        actions: Vec::new(),
    }
}

pub fn please_wait_attachment() -> Attachment {
    Attachment {
        text: "A planning iteration is already in progress; only the workflow owner's feedback is queued.".to_string(),
        pretext: None,
        color: Some("#8c8c8c".to_string()),
        actions: Vec::new(),
    }
}

pub fn rejected_attachment(reason: &str) -> Attachment {
    Attachment {
        text: reason.to_string(),
        pretext: Some(":no_entry_sign: Workflow cancelled".to_string()),
        color: Some("#8c8c8c".to_string()),
        actions: Vec::new(),
    }
}
