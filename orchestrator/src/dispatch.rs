//! Webhook event routing (spec.md §4.I): implements [`webhook::WebhookDispatch`] and turns each
//! parsed `WebhookEvent` into the matching [`review::ReviewEngine`] call.

use std::sync::Arc;

use axum::http::StatusCode;
use scm_client::{IssueComment, PullRequest, Review, ReviewComment, ReviewState};
use serde_json::Value;
use webhook::WebhookEvent;

use crate::state::Orchestrator;

pub struct WebhookRouter {
    orchestrator: Arc<Orchestrator>,
}

impl WebhookRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait::async_trait]
impl webhook::WebhookDispatch for WebhookRouter {
    async fn dispatch(&self, event: WebhookEvent) -> StatusCode {
        match &event {
            WebhookEvent::Ping => StatusCode::OK,
            WebhookEvent::Ignored(_) => StatusCode::OK,
            WebhookEvent::PullRequest(ev) => self.handle_pull_request(ev).await,
            WebhookEvent::PullRequestReview(ev) => self.handle_pull_request_review(ev).await,
            WebhookEvent::PullRequestReviewComment(ev) => self.handle_pull_request_review_comment(ev).await,
            WebhookEvent::IssueComment(ev) => self.handle_issue_comment(ev).await,
        }
    }
}

impl WebhookRouter {
    /// `synchronize` moves `cursor_fixing` back to `awaiting_review` (spec.md §4.I); every other
    /// action is a no-op here since the loop only exists once the poller or janitor bootstraps it.
    async fn handle_pull_request(&self, ev: &webhook::PullRequestEvent) -> StatusCode {
        if ev.action != "synchronize" {
            return StatusCode::OK;
        }
        let Some(pr) = parse_pull_request(&ev.pull_request) else { return StatusCode::OK };
        let Ok(Some(loop_)) = self.orchestrator.store.get_review_loop_by_pr(&pr.html_url).await else { return StatusCode::OK };
        match self.orchestrator.review.handle_pr_synchronize(&loop_.id, &pr.head_sha).await {
            Ok(_) => StatusCode::OK,
            Err(e) => {
                tracing::warn!(error = %e, "handle_pr_synchronize failed");
                StatusCode::OK
            }
        }
    }

    async fn handle_pull_request_review(&self, ev: &webhook::PullRequestReviewEvent) -> StatusCode {
        if ev.action != "submitted" {
            return StatusCode::OK;
        }
        let (Some(pr), Some(review)) = (parse_pull_request(&ev.pull_request), parse_review(&ev.review)) else {
            return StatusCode::OK;
        };
        let Ok(Some(loop_)) = self.orchestrator.store.get_review_loop_by_pr(&pr.html_url).await else { return StatusCode::OK };

        let result = if is_ai_reviewer(&review.user_login) {
            self.orchestrator.review.handle_ai_review(&loop_.id, &review, &pr).await
        } else if review.state == ReviewState::Approved {
            self.orchestrator.review.handle_human_review_approval(&loop_.id, &review.user_login).await
        } else {
            self.orchestrator.review.handle_human_review_feedback(&loop_.id, &pr).await
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "pull_request_review dispatch failed");
        }
        StatusCode::OK
    }

    /// A CodeRabbit-style reviewer posts line comments outside a formal `Review` object; this
    /// just re-runs feedback dispatch against whatever the PR currently carries (spec.md §4.I,
    /// §4.J non-CodeRabbit vs CodeRabbit route is decided inside `dispatch_review_feedback`).
    async fn handle_pull_request_review_comment(&self, ev: &webhook::PullRequestReviewCommentEvent) -> StatusCode {
        if ev.action != "created" {
            return StatusCode::OK;
        }
        let Some(pr) = parse_pull_request(&ev.pull_request) else { return StatusCode::OK };
        let Ok(Some(loop_)) = self.orchestrator.store.get_review_loop_by_pr(&pr.html_url).await else { return StatusCode::OK };
        if let Err(e) = self.orchestrator.review.dispatch_review_feedback(&loop_.id, &pr).await {
            tracing::warn!(error = %e, "review_comment dispatch failed");
        }
        StatusCode::OK
    }

    /// A top-level issue comment (e.g. `@coderabbitai resolve`) can also surface new feedback;
    /// treated the same as a review comment arriving (spec.md §4.I).
    async fn handle_issue_comment(&self, ev: &webhook::IssueCommentEvent) -> StatusCode {
        if ev.action != "created" {
            return StatusCode::OK;
        }
        let Some(pr_url) = ev.issue.get("pull_request").and_then(|v| v.get("html_url")).and_then(|v| v.as_str()) else {
            return StatusCode::OK;
        };
        let Ok(Some(loop_)) = self.orchestrator.store.get_review_loop_by_pr(pr_url).await else { return StatusCode::OK };
        let pr = pr_from_loop(&loop_);
        if let Err(e) = self.orchestrator.review.dispatch_review_feedback(&loop_.id, &pr).await {
            tracing::warn!(error = %e, "issue_comment dispatch failed");
        }
        StatusCode::OK
    }
}

/// Builds a minimal [`PullRequest`] from a stored loop for feedback dispatch, which only reads
/// `head_sha` off it; avoids an extra SCM round trip when the webhook payload carries no PR body.
fn pr_from_loop(loop_: &store::ReviewLoop) -> PullRequest {
    PullRequest {
        number: loop_.pr_number,
        node_id: String::new(),
        html_url: loop_.pr_url.clone(),
        head_sha: loop_.last_commit_sha.clone(),
        head_ref: String::new(),
        base_ref: String::new(),
        draft: false,
        state: "open".to_string(),
    }
}

fn is_ai_reviewer(login: &str) -> bool {
    let lower = login.to_lowercase();
    lower == review::CODERABBIT_LOGIN || config::global().ai_reviewer_bots.iter().any(|b| b.trim().to_lowercase() == lower)
}

fn get_str(v: &Value, key: &str) -> String {
    v.get(key).and_then(|x| x.as_str()).unwrap_or_default().to_string()
}

fn parse_pull_request(v: &Value) -> Option<PullRequest> {
    Some(PullRequest {
        number: v.get("number")?.as_u64()?,
        node_id: get_str(v, "node_id"),
        html_url: get_str(v, "html_url"),
        head_sha: get_str(v.get("head")?, "sha"),
        head_ref: get_str(v.get("head")?, "ref"),
        base_ref: get_str(v.get("base")?, "ref"),
        draft: v.get("draft").and_then(|x| x.as_bool()).unwrap_or(false),
        state: get_str(v, "state"),
    })
}

fn parse_review(v: &Value) -> Option<Review> {
    let state = match v.get("state")?.as_str()? {
        "approved" => ReviewState::Approved,
        "changes_requested" => ReviewState::ChangesRequested,
        "commented" => ReviewState::Commented,
        "dismissed" => ReviewState::Dismissed,
        _ => ReviewState::Pending,
    };
    Some(Review {
        id: v.get("id")?.as_u64()?,
        body: get_str(v, "body"),
        state,
        user_login: get_str(v.get("user")?, "login"),
        commit_id: get_str(v, "commit_id"),
        html_url: get_str(v, "html_url"),
        submitted_at: v.get("submitted_at").and_then(|x| x.as_str()).map(str::to_string),
    })
}

#[allow(dead_code)]
fn parse_review_comment(v: &Value) -> Option<ReviewComment> {
    Some(ReviewComment {
        id: v.get("id")?.as_u64()?,
        node_id: get_str(v, "node_id"),
        body: get_str(v, "body"),
        path: get_str(v, "path"),
        line: v.get("line").and_then(|x| x.as_u64()).map(|n| n as u32),
        commit_id: get_str(v, "commit_id"),
        user_login: get_str(v.get("user")?, "login"),
        html_url: get_str(v, "html_url"),
    })
}

#[allow(dead_code)]
fn parse_issue_comment(v: &Value) -> Option<IssueComment> {
    Some(IssueComment {
        id: v.get("id")?.as_u64()?,
        node_id: get_str(v, "node_id"),
        body: get_str(v, "body"),
        user_login: get_str(v.get("user")?, "login"),
        html_url: get_str(v, "html_url"),
    })
}
