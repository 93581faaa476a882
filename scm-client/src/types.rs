use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub node_id: String,
    pub body: String,
    pub path: String,
    pub line: Option<u32>,
    pub commit_id: String,
    pub user_login: String,
    pub html_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub body: String,
    pub state: ReviewState,
    pub user_login: String,
    pub commit_id: String,
    pub html_url: String,
    pub submitted_at: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub node_id: String,
    pub body: String,
    pub user_login: String,
    pub html_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    /// GraphQL node id, required by `mark_pr_ready_for_review` (no REST endpoint exists for it).
    pub node_id: String,
    pub html_url: String,
    pub head_sha: String,
    pub head_ref: String,
    pub base_ref: String,
    pub draft: bool,
    pub state: String,
}
