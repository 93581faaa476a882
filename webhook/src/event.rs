//! Closed webhook event-type variant set plus an "ignored" default sink (spec.md §9).

use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PullRequestReviewEvent {
    pub action: String,
    pub pull_request: Value,
    pub review: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PullRequestReviewCommentEvent {
    pub action: String,
    pub pull_request: Value,
    pub comment: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Value,
    pub comment: Value,
}

#[derive(Clone, Debug)]
pub enum WebhookEvent {
    Ping,
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    PullRequestReviewComment(PullRequestReviewCommentEvent),
    IssueComment(IssueCommentEvent),
    /// Any `X-Event-Type` this core does not act on. Always returns 200 without dispatch
    /// (spec.md §4.E step 5 "Unknown event types return 200").
    Ignored(String),
}

impl WebhookEvent {
    /// Parses `body` according to `event_type` (the `X-Event-Type` header value).
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            "ping" => WebhookEvent::Ping,
            "pull_request" => WebhookEvent::PullRequest(serde_json::from_slice(body)?),
            "pull_request_review" => WebhookEvent::PullRequestReview(serde_json::from_slice(body)?),
            "pull_request_review_comment" => WebhookEvent::PullRequestReviewComment(serde_json::from_slice(body)?),
            "issue_comment" => WebhookEvent::IssueComment(serde_json::from_slice(body)?),
            other => WebhookEvent::Ignored(other.to_string()),
        })
    }
}
