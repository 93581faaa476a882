//! Entities from spec.md §3. All ids are opaque strings; all timestamps are unix milliseconds.

use serde::{Deserialize, Serialize};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Lifecycle status of a launched remote agent (spec.md §3 AgentRecord).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Creating,
    Running,
    Finished,
    Failed,
    Stopped,
    Merged,
    PrClosed,
}

impl AgentStatus {
    /// Active (non-terminal) status ⇔ presence in the active-agent index (spec.md §3, §8).
    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Creating | AgentStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

/// One launched remote agent (spec.md §3 AgentRecord).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRecord {
    pub cursor_agent_id: String,
    pub trigger_post_id: String,
    pub post_id: String,
    pub bot_reply_post_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub status: AgentStatus,
    pub repository: String,
    pub branch: String,
    pub target_branch: Option<String>,
    pub pr_url: Option<String>,
    pub prompt: String,
    pub description: Option<String>,
    pub model: String,
    pub summary: Option<String>,
    pub archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentRecord {
    pub fn new(
        cursor_agent_id: impl Into<String>,
        trigger_post_id: impl Into<String>,
        post_id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let ts = now_ms();
        Self {
            cursor_agent_id: cursor_agent_id.into(),
            trigger_post_id: trigger_post_id.into(),
            post_id: post_id.into(),
            bot_reply_post_id: None,
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            status: AgentStatus::Creating,
            repository: repository.into(),
            branch: branch.into(),
            target_branch: None,
            pr_url: None,
            prompt: prompt.into(),
            description: None,
            model: model.into(),
            summary: None,
            archived: false,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// (status terminal ∧ pr_url set) ⇔ presence in the finished-with-PR index (spec.md §3, §8).
    pub fn is_finished_with_pr(&self) -> bool {
        self.status.is_terminal() && self.pr_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Phase of a HITL workflow (spec.md §3 HITLWorkflow, §4.H).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    ContextReview,
    Planning,
    PlanReview,
    Implementing,
    Rejected,
    Complete,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowPhase::Rejected | WorkflowPhase::Complete)
    }
}

/// A HITL workflow (spec.md §3 HITLWorkflow).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HitlWorkflow {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub root_post_id: String,
    pub trigger_post_id: String,
    pub phase: WorkflowPhase,
    pub repository: String,
    pub branch: String,
    pub model: String,
    pub auto_create_pr: bool,
    pub original_prompt: String,

    pub enriched_context: Option<String>,
    pub approved_context: Option<String>,
    pub context_post_id: Option<String>,
    pub context_images: Vec<String>,

    pub planner_agent_id: Option<String>,
    pub retrieved_plan: Option<String>,
    pub approved_plan: Option<String>,
    pub plan_post_id: Option<String>,
    pub plan_iteration_count: u32,
    pub pending_feedback: Option<String>,

    pub implementer_agent_id: Option<String>,

    pub skip_context_review: bool,
    pub skip_plan_loop: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl HitlWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        root_post_id: impl Into<String>,
        trigger_post_id: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        model: impl Into<String>,
        auto_create_pr: bool,
        original_prompt: impl Into<String>,
        skip_context_review: bool,
        skip_plan_loop: bool,
    ) -> Self {
        let ts = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            root_post_id: root_post_id.into(),
            trigger_post_id: trigger_post_id.into(),
            phase: WorkflowPhase::ContextReview,
            repository: repository.into(),
            branch: branch.into(),
            model: model.into(),
            auto_create_pr,
            original_prompt: original_prompt.into(),
            enriched_context: None,
            approved_context: None,
            context_post_id: None,
            context_images: Vec::new(),
            planner_agent_id: None,
            retrieved_plan: None,
            approved_plan: None,
            plan_post_id: None,
            plan_iteration_count: 0,
            pending_feedback: None,
            implementer_agent_id: None,
            skip_context_review,
            skip_plan_loop,
            created_at: ts,
            updated_at: ts,
        }
    }
}

/// Phase of an automated review loop (spec.md §3 ReviewLoop, §4.I).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    RequestingReview,
    AwaitingReview,
    CursorFixing,
    Approved,
    HumanReview,
    Complete,
    MaxIterations,
    Failed,
}

impl ReviewPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReviewPhase::Complete | ReviewPhase::MaxIterations | ReviewPhase::Failed
        )
    }
}

/// One append-only phase-transition event (spec.md §3 ReviewLoop.history).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub at: i64,
    pub event: String,
    pub detail: serde_json::Value,
}

/// A PR's automated review loop (spec.md §3 ReviewLoop).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewLoop {
    pub id: String,
    pub agent_record_id: String,
    pub workflow_id: Option<String>,
    pub user_id: String,
    pub channel_id: String,
    pub root_post_id: String,
    pub trigger_post_id: String,

    pub pr_url: String,
    pub pr_number: u64,
    pub owner: String,
    pub repo: String,
    pub repository: String,

    pub phase: ReviewPhase,
    pub iteration: u32,
    pub last_commit_sha: String,

    pub last_feedback_dispatch_at: Option<i64>,
    pub last_feedback_dispatch_sha: Option<String>,
    pub last_feedback_digest: Option<String>,
    pub feedback_cursor: Option<String>,

    pub findings: Vec<super::ReviewFinding>,
    pub history: Vec<ReviewHistoryEntry>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Bound on `findings`/`history` length (spec.md §9 "Bounded history").
pub const MAX_REVIEW_LOOP_LIST_LEN: usize = 512;

impl ReviewLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_record_id: impl Into<String>,
        workflow_id: Option<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        root_post_id: impl Into<String>,
        trigger_post_id: impl Into<String>,
        pr_url: impl Into<String>,
        pr_number: u64,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        let ts = now_ms();
        let owner = owner.into();
        let repo = repo.into();
        let repository = format!("{owner}/{repo}");
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_record_id: agent_record_id.into(),
            workflow_id,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            root_post_id: root_post_id.into(),
            trigger_post_id: trigger_post_id.into(),
            pr_url: pr_url.into(),
            pr_number,
            owner,
            repo,
            repository,
            phase: ReviewPhase::RequestingReview,
            iteration: 1,
            last_commit_sha: String::new(),
            last_feedback_dispatch_at: None,
            last_feedback_dispatch_sha: None,
            last_feedback_digest: None,
            feedback_cursor: None,
            findings: Vec::new(),
            history: Vec::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Appends a history entry, evicting the oldest (FIFO) once the bound is exceeded
    /// (spec.md §9 "Bounded history").
    pub fn push_history(&mut self, event: impl Into<String>, detail: serde_json::Value) {
        self.history.push(ReviewHistoryEntry {
            at: now_ms(),
            event: event.into(),
            detail,
        });
        if self.history.len() > MAX_REVIEW_LOOP_LIST_LEN {
            let overflow = self.history.len() - MAX_REVIEW_LOOP_LIST_LEN;
            self.history.drain(0..overflow);
        }
    }

    /// Inserts or updates `findings` by key, then evicts the oldest by `last_seen_at` once the
    /// bound is exceeded (spec.md §9 "Bounded history").
    pub fn upsert_finding(&mut self, finding: super::ReviewFinding) {
        if let Some(existing) = self.findings.iter_mut().find(|f| f.key == finding.key) {
            *existing = finding;
        } else {
            self.findings.push(finding);
        }
        if self.findings.len() > MAX_REVIEW_LOOP_LIST_LEN {
            self.findings.sort_by_key(|f| f.last_seen_at);
            let overflow = self.findings.len() - MAX_REVIEW_LOOP_LIST_LEN;
            self.findings.drain(0..overflow);
        }
    }
}

/// Where a piece of reviewer feedback came from (spec.md §3 ReviewFinding).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    ReviewComment,
    ReviewBody,
    IssueComment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerType {
    AiBot,
    Human,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Resolved,
    Dismissed,
    Superseded,
}

/// A deduplicated, persisted piece of actionable reviewer feedback (spec.md §3 ReviewFinding).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub key: String,
    pub status: FindingStatus,
    pub source_type: SourceType,
    pub source_id: String,
    pub source_url: String,
    pub source_node_id: Option<String>,
    pub reviewer_login: String,
    pub reviewer_type: ReviewerType,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub commit_sha: String,
    pub raw_text: String,
    pub actionable_text: String,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub first_seen_iteration: u32,
    pub last_seen_iteration: u32,
}

/// Per-channel defaults (spec.md §3 ChannelSettings).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub default_repository: Option<String>,
    pub default_branch: Option<String>,
    pub default_model: Option<String>,
}

/// Per-user defaults, including tri-state HITL toggles where `None` means "inherit global"
/// (spec.md §3 UserSettings).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub default_repository: Option<String>,
    pub default_branch: Option<String>,
    pub default_model: Option<String>,
    pub hitl_skip_context_review: Option<bool>,
    pub hitl_skip_plan_loop: Option<bool>,
}

/// The value stored at a thread→(agent|workflow) index slot (spec.md §3, §9).
///
/// The `hitl:` value prefix distinguishes a workflow reference from a bare agent reference
/// at the same key; [`crate::Store::get_agent_id_by_thread`] and
/// [`crate::Store::get_workflow_id_by_thread`] each decode only their own kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThreadRef {
    Agent(String),
    Workflow(String),
}

impl ThreadRef {
    pub(crate) fn encode(&self) -> String {
        match self {
            ThreadRef::Agent(id) => id.clone(),
            ThreadRef::Workflow(id) => format!("hitl:{id}"),
        }
    }

    pub(crate) fn decode(raw: &str) -> Self {
        match raw.strip_prefix("hitl:") {
            Some(id) => ThreadRef::Workflow(id.to_string()),
            None => ThreadRef::Agent(raw.to_string()),
        }
    }
}
