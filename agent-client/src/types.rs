use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
pub struct SourceRef {
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TargetRef {
    pub branch_name: String,
    pub auto_create_pr: bool,
    /// Always pass explicitly: the API defaults branch auto-creation to `true`, which would
    /// create an orphan branch on every read-only planner iteration (spec.md §9 "auto-branch
    /// default trap").
    pub auto_branch: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LaunchRequest {
    pub prompt: String,
    pub source: SourceRef,
    pub target: TargetRef,
    pub model: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AgentResponse {
    pub id: String,
    pub status: String,
    pub name: Option<String>,
    #[serde(default)]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListAgentsResponse {
    pub agents: Vec<AgentResponse>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddFollowupRequest {
    pub prompt: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConversationResponse {
    pub messages: Vec<ConversationMessage>,
}

impl ConversationResponse {
    /// The plan-extraction rule (spec.md §4.H, §9): always read the last assistant message;
    /// earlier assistant messages are progress-only.
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .map(|m| m.content.as_str())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub email: Option<String>,
}
