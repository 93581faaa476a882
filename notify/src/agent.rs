//! Agent-lifecycle attachments (spec.md §4.K): the bot reply post is updated in place as the
//! agent's remote status changes.

use std::collections::HashMap;

use chat_host::{Attachment, AttachmentAction};
use store::{AgentRecord, AgentStatus};

fn color_for(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Creating | AgentStatus::Running => "#f2c744",
        AgentStatus::Finished | AgentStatus::Merged => "#36a64f",
        AgentStatus::Failed => "#d94f4f",
        AgentStatus::Stopped | AgentStatus::PrClosed => "#8c8c8c",
    }
}

fn cancel_action(agent_id: &str) -> AttachmentAction {
    let mut context = HashMap::new();
    context.insert("action".to_string(), serde_json::Value::String("cancel_agent".to_string()));
    context.insert("cursor_agent_id".to_string(), serde_json::Value::String(agent_id.to_string()));
    AttachmentAction {
        id: "cancel".to_string(),
        name: "Cancel".to_string(),
        integration_url: "/api/v1/actions/hitl-response".to_string(),
        context,
    }
}

/// Launch attachment: posted as the new bot reply immediately after a successful `LaunchAgent`
/// call (spec.md §4.F).
pub fn launch_attachment(agent: &AgentRecord) -> Attachment {
    Attachment {
        text: format!("Launching on `{}` (branch `{}`)\n\n> {}", agent.repository, agent.branch, agent.prompt),
        pretext: Some(":hourglass_flowing_sand: Starting agent…".to_string()),
        color: Some(color_for(agent.status).to_string()),
        actions: vec![cancel_action(&agent.cursor_agent_id)],
    }
}

/// Updated attachment once the remote status transitions to `RUNNING` (spec.md §4.G).
pub fn running_attachment(agent: &AgentRecord) -> Attachment {
    Attachment {
        text: format!("Running on `{}` (branch `{}`)\n\n> {}", agent.repository, agent.branch, agent.prompt),
        pretext: Some(":gear: Now running".to_string()),
        color: Some(color_for(agent.status).to_string()),
        actions: vec![cancel_action(&agent.cursor_agent_id)],
    }
}

/// Updated attachment once the agent finishes, with a PR link or a branch fallback when no PR
/// exists (spec.md §4.G transition handling).
pub fn finished_attachment(agent: &AgentRecord) -> Attachment {
    let body = match &agent.pr_url {
        Some(pr_url) => format!("Finished on `{}`.\n\nPull request: {pr_url}", agent.repository),
        None => format!("Finished on `{}` (branch `{}`, no pull request was opened).", agent.repository, agent.branch),
    };
    Attachment {
        text: body,
        pretext: Some(":white_check_mark: Finished".to_string()),
        color: Some(color_for(agent.status).to_string()),
        actions: Vec::new(),
    }
}

pub fn failed_attachment(agent: &AgentRecord, reason: Option<&str>) -> Attachment {
    let mut text = format!("Failed on `{}` (branch `{}`).", agent.repository, agent.branch);
    if let Some(reason) = reason {
        text.push_str(&format!("\n\n```\n{reason}\n```"));
    }
    Attachment {
        text,
        pretext: Some(":x: Failed".to_string()),
        color: Some(color_for(agent.status).to_string()),
        actions: Vec::new(),
    }
}

pub fn stopped_attachment(agent: &AgentRecord) -> Attachment {
    Attachment {
        text: format!("Stopped on `{}` (branch `{}`).", agent.repository, agent.branch),
        pretext: Some(":no_entry_sign: Stopped".to_string()),
        color: Some(color_for(agent.status).to_string()),
        actions: Vec::new(),
    }
}

/// Rendering for an [`agent_client::ClientError`]'s raw body: code-block if it looks
/// JSON-shaped, verbatim otherwise (spec.md §7 "Remote-agent API error").
pub fn render_api_error(raw_body: &str) -> String {
    let trimmed = raw_body.trim();
    if (trimmed.starts_with('{') && trimmed.ends_with('}')) || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
        format!("```json\n{trimmed}\n```")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentRecord {
        AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "cursor/fix", "fix it", "auto")
    }

    #[test]
    fn finished_with_pr_links_the_pr() {
        let mut a = agent();
        a.status = AgentStatus::Finished;
        a.pr_url = Some("https://github.com/o/r/pull/1".to_string());
        let att = finished_attachment(&a);
        assert!(att.text.contains("https://github.com/o/r/pull/1"));
    }

    #[test]
    fn finished_without_pr_falls_back_to_branch() {
        let mut a = agent();
        a.status = AgentStatus::Finished;
        let att = finished_attachment(&a);
        assert!(att.text.contains("cursor/fix"));
    }

    #[test]
    fn json_shaped_error_renders_as_code_block() {
        assert_eq!(render_api_error(r#"{"error":"bad"}"#), "```json\n{\"error\":\"bad\"}\n```");
    }

    #[test]
    fn plain_error_renders_verbatim() {
        assert_eq!(render_api_error("internal server error"), "internal server error");
    }
}
