//! Review-loop engine (spec.md §4.I): bootstraps a loop when an agent's PR appears, drives AI
//! and human review phases, and dispatches feedback back to the remote agent.

use std::sync::Arc;
use std::time::Duration;

use scm_client::{PullRequest, Review, ReviewState, ScmClient};
use store::{AgentRecord, ReviewFinding, ReviewLoop, ReviewPhase, Store};
use stream_event::PluginEvent;

use crate::classify::{self, ClassifyResult};
use crate::digest;
use crate::error::ReviewError;
use crate::extract;

const READ_DEADLINE: Duration = Duration::from_secs(15);
const FOLLOWUP_DEADLINE: Duration = Duration::from_secs(30);

pub struct ReviewEngine {
    store: Arc<Store>,
    scm: Arc<dyn ScmClient>,
    agent_client: Arc<agent_client::Client>,
    chat_host: Arc<dyn chat_host::ChatHost>,
    plugin_id: String,
    ai_reviewer_bots: Vec<String>,
    human_reviewers: Vec<String>,
    max_review_iterations: u32,
}

impl ReviewEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        scm: Arc<dyn ScmClient>,
        agent_client: Arc<agent_client::Client>,
        chat_host: Arc<dyn chat_host::ChatHost>,
        plugin_id: impl Into<String>,
        ai_reviewer_bots: Vec<String>,
        human_reviewers: Vec<String>,
        max_review_iterations: u32,
    ) -> Self {
        Self {
            store,
            scm,
            agent_client,
            chat_host,
            plugin_id: plugin_id.into(),
            ai_reviewer_bots,
            human_reviewers,
            max_review_iterations,
        }
    }

    async fn get(&self, loop_id: &str) -> Result<ReviewLoop, ReviewError> {
        self.store.get_review_loop(loop_id).await?.ok_or_else(|| ReviewError::LoopNotFound(loop_id.to_string()))
    }

    /// Creates the loop for an agent's PR if one doesn't already exist (spec.md §4.I
    /// "bootstrap"). Returns `None` if the agent has no PR yet.
    pub async fn bootstrap(&self, agent: &AgentRecord, workflow_id: Option<String>) -> Result<Option<ReviewLoop>, ReviewError> {
        let Some(pr_url) = agent.pr_url.clone() else {
            return Ok(None);
        };
        if let Some(existing) = self.store.get_review_loop_by_pr(&pr_url).await? {
            return Ok(Some(existing));
        }

        let (owner, repo, pr_number) = parse_pr_url(&pr_url).ok_or_else(|| ReviewError::LoopNotFound(pr_url.clone()))?;
        let pr = self.scm.get_pull_request_by_branch(&owner, &repo, &agent.branch, READ_DEADLINE).await?;

        let mut review_loop = ReviewLoop::new(
            agent.cursor_agent_id.clone(),
            workflow_id,
            agent.user_id.clone(),
            agent.channel_id.clone(),
            agent.post_id.clone(),
            agent.trigger_post_id.clone(),
            pr_url.clone(),
            pr_number,
            owner.clone(),
            repo.clone(),
        );
        review_loop.last_commit_sha = pr.head_sha.clone();
        self.store.save_review_loop(&review_loop).await?;

        if let Err(e) = self.scm.mark_pr_ready_for_review(&owner, &repo, &pr.node_id, READ_DEADLINE).await {
            tracing::warn!(pr_url = %pr_url, error = %e, "mark pr ready for review failed");
        }
        if !self.ai_reviewer_bots.is_empty() {
            if let Err(e) = self.scm.request_reviewers(&owner, &repo, pr_number, &self.ai_reviewer_bots, READ_DEADLINE).await {
                tracing::warn!(pr_url = %pr_url, error = %e, "request ai reviewers failed (bots may auto-attach)");
            }
        }

        let old_phase = review_loop.phase;
        review_loop.phase = ReviewPhase::AwaitingReview;
        review_loop.push_history("bootstrap", serde_json::json!({ "pr_url": pr_url }));
        self.store.save_review_loop(&review_loop).await?;
        self.notify_phase_transition(&review_loop, old_phase).await;

        Ok(Some(review_loop))
    }

    /// Handles one AI-reviewer `Review` event (spec.md §4.I "handleAIReview").
    pub async fn handle_ai_review(&self, loop_id: &str, review: &Review, pr: &PullRequest) -> Result<ReviewLoop, ReviewError> {
        let loop_ = self.get(loop_id).await?;
        if loop_.phase != ReviewPhase::AwaitingReview {
            return Ok(loop_);
        }
        if !self.is_ai_reviewer(&review.user_login) {
            return Ok(loop_);
        }

        let approved = review.state == ReviewState::Approved || coderabbit_reports_zero_comments(&review.body);
        if approved {
            let mut approved_loop = loop_;
            let old_phase = approved_loop.phase;
            approved_loop.phase = ReviewPhase::Approved;
            approved_loop.push_history("ai_review_approved", serde_json::json!({ "reviewer": review.user_login }));
            self.store.save_review_loop(&approved_loop).await?;
            self.notify_phase_transition(&approved_loop, old_phase).await;
            return self.transition_to_human_review(approved_loop).await;
        }

        self.dispatch_review_feedback(loop_id, pr).await
    }

    pub async fn handle_human_review_approval(&self, loop_id: &str, approver_login: &str) -> Result<ReviewLoop, ReviewError> {
        let mut loop_ = self.get(loop_id).await?;
        if loop_.phase != ReviewPhase::HumanReview {
            return Ok(loop_);
        }
        let old_phase = loop_.phase;
        loop_.phase = ReviewPhase::Complete;
        loop_.push_history("human_review_approved", serde_json::json!({ "approver": approver_login }));
        self.store.save_review_loop(&loop_).await?;
        self.notify_phase_transition(&loop_, old_phase).await;
        Ok(loop_)
    }

    pub async fn handle_human_review_feedback(&self, loop_id: &str, pr: &PullRequest) -> Result<ReviewLoop, ReviewError> {
        let loop_ = self.get(loop_id).await?;
        if loop_.phase != ReviewPhase::HumanReview {
            return Ok(loop_);
        }
        self.dispatch_review_feedback(loop_id, pr).await
    }

    /// A `synchronize` webhook (new commits pushed) moves `cursor_fixing` back to
    /// `awaiting_review` (spec.md §4.I).
    pub async fn handle_pr_synchronize(&self, loop_id: &str, new_head_sha: &str) -> Result<ReviewLoop, ReviewError> {
        let mut loop_ = self.get(loop_id).await?;
        if loop_.phase != ReviewPhase::CursorFixing {
            return Ok(loop_);
        }
        loop_.phase = ReviewPhase::AwaitingReview;
        loop_.last_commit_sha = new_head_sha.to_string();
        loop_.push_history("synchronize", serde_json::json!({ "head_sha": new_head_sha }));
        self.store.save_review_loop(&loop_).await?;
        self.publish(&loop_).await?;
        Ok(loop_)
    }

    /// Collects current feedback, classifies it against the loop's findings, and either
    /// dispatches a follow-up, skips as idempotent, or hits the iteration cap (spec.md §4.I
    /// "dispatchReviewFeedback", §4.J dispatch decision log).
    pub async fn dispatch_review_feedback(&self, loop_id: &str, pr: &PullRequest) -> Result<ReviewLoop, ReviewError> {
        let mut loop_ = self.get(loop_id).await?;

        let (review_comments, reviews, issue_comments) = self.fetch_sources(&loop_.owner, &loop_.repo, loop_.pr_number).await?;
        let raw = extract::candidates_from(&review_comments, &reviews, &issue_comments);
        let extracted = extract::extract(&loop_, raw, &self.ai_reviewer_bots);
        let result = classify::classify(&loop_.findings, extracted, loop_.iteration, now_ms());

        if result.dispatchable.is_empty() {
            for f in &result.updated_findings {
                loop_.upsert_finding(f.clone());
            }
            self.store.save_review_loop(&loop_).await?;
            self.log_decision(&loop_, "no_dispatch", "no_dispatchable_findings", &result);
            return Ok(loop_);
        }

        if loop_.iteration >= self.max_review_iterations {
            for f in &result.updated_findings {
                loop_.upsert_finding(f.clone());
            }
            let old_phase = loop_.phase;
            loop_.phase = ReviewPhase::MaxIterations;
            loop_.push_history("max_iterations", serde_json::json!({ "iteration": loop_.iteration }));
            self.store.save_review_loop(&loop_).await?;
            self.log_decision(&loop_, "blocked", "max_iterations_reached", &result);
            self.notify_phase_transition(&loop_, old_phase).await;
            return Ok(loop_);
        }

        let digest_value = digest::compute_digest(&result.dispatchable.iter().collect::<Vec<_>>());
        let unchanged = loop_.last_feedback_digest.as_deref() == Some(digest_value.as_str()) && loop_.last_feedback_dispatch_sha.as_deref() == Some(pr.head_sha.as_str());

        if unchanged {
            for f in &result.updated_findings {
                loop_.upsert_finding(f.clone());
            }
            loop_.push_history(
                "skipped_idempotent",
                serde_json::json!({ "digest": digest_value, "sha": pr.head_sha, "new": result.new_count, "repeated": result.repeated_count, "dismissed": result.resolved_count }),
            );
            self.store.save_review_loop(&loop_).await?;
            self.log_decision(&loop_, "skipped_idempotent", "digest_and_sha_unchanged", &result);
            return Ok(loop_);
        }

        let prompt = build_followup_prompt(&loop_, &result.dispatchable);
        match self.agent_client.add_followup(&loop_.agent_record_id, &prompt, agent_client::Deadline::after(FOLLOWUP_DEADLINE)).await {
            Ok(_) => {
                for f in &result.updated_findings {
                    loop_.upsert_finding(f.clone());
                }
                loop_.last_feedback_dispatch_at = Some(now_ms());
                loop_.last_feedback_dispatch_sha = Some(pr.head_sha.clone());
                loop_.last_feedback_digest = Some(digest_value.clone());
                let old_phase = loop_.phase;
                loop_.phase = ReviewPhase::CursorFixing;
                loop_.iteration += 1;
                loop_.push_history(
                    "direct_success",
                    serde_json::json!({ "digest": digest_value, "sha": pr.head_sha, "new": result.new_count, "repeated": result.repeated_count, "dismissed": result.resolved_count }),
                );
                self.store.save_review_loop(&loop_).await?;
                self.log_decision(&loop_, "direct", "dispatched", &result);
                self.notify_phase_transition(&loop_, old_phase).await;
            }
            Err(e) => {
                for f in &result.updated_findings {
                    loop_.upsert_finding(f.clone());
                }
                loop_.push_history("direct_failed", serde_json::json!({ "error": e.to_string(), "manual_intervention_required": true }));
                self.store.save_review_loop(&loop_).await?;
                self.log_decision(&loop_, "failed", "add_followup_error", &result);
            }
        }

        Ok(loop_)
    }

    async fn transition_to_human_review(&self, mut loop_: ReviewLoop) -> Result<ReviewLoop, ReviewError> {
        if !self.human_reviewers.is_empty() {
            if let Err(e) = self.scm.request_reviewers(&loop_.owner, &loop_.repo, loop_.pr_number, &self.human_reviewers, READ_DEADLINE).await {
                tracing::warn!(pr_url = %loop_.pr_url, error = %e, "request human reviewers failed");
            }
        }
        let old_phase = loop_.phase;
        loop_.phase = ReviewPhase::HumanReview;
        loop_.push_history("transition_to_human_review", serde_json::json!({}));
        self.store.save_review_loop(&loop_).await?;
        self.notify_phase_transition(&loop_, old_phase).await;
        Ok(loop_)
    }

    fn is_ai_reviewer(&self, login: &str) -> bool {
        let lower = login.trim().to_lowercase();
        lower == extract::CODERABBIT_LOGIN || self.ai_reviewer_bots.iter().any(|b| b.trim().to_lowercase() == lower)
    }

    async fn fetch_sources(&self, owner: &str, repo: &str, pr_number: u64) -> Result<(Vec<scm_client::ReviewComment>, Vec<Review>, Vec<scm_client::IssueComment>), ReviewError> {
        let review_comments = self.scm.list_review_comments(owner, repo, pr_number, READ_DEADLINE).await?;
        let reviews = self.scm.list_reviews(owner, repo, pr_number, READ_DEADLINE).await?;
        let issue_comments = self.scm.list_issue_comments(owner, repo, pr_number, READ_DEADLINE).await?;
        Ok((review_comments, reviews, issue_comments))
    }

    async fn notify_phase_transition(&self, loop_: &ReviewLoop, old_phase: ReviewPhase) {
        if let Some(old_emoji) = notify::reaction_for_phase(old_phase) {
            if let Err(e) = self.chat_host.remove_reaction(&loop_.trigger_post_id, old_emoji).await {
                tracing::warn!(error = %e, "remove reaction failed");
            }
        }
        if let Some(emoji) = notify::reaction_for_phase(loop_.phase) {
            if let Err(e) = self.chat_host.add_reaction(&loop_.trigger_post_id, emoji).await {
                tracing::warn!(error = %e, "add reaction failed");
            }
        }
        if let Err(e) = self.chat_host.create_post(&loop_.channel_id, &loop_.root_post_id, &notify::phase_message(loop_), Vec::new()).await {
            tracing::warn!(error = %e, "post review status failed");
        }
        if let Err(e) = self.publish(loop_).await {
            tracing::warn!(error = %e, "publish review loop event failed");
        }
    }

    async fn publish(&self, loop_: &ReviewLoop) -> Result<(), ReviewError> {
        let event = PluginEvent::ReviewLoopChanged {
            review_loop_id: loop_.id.clone(),
            phase: phase_wire_name(loop_.phase).to_string(),
            iteration: loop_.iteration,
            pr_url: loop_.pr_url.clone(),
            updated_at: loop_.updated_at.to_string(),
        };
        chat_host::publish(self.chat_host.as_ref(), &self.plugin_id, &loop_.user_id, &event).await?;
        Ok(())
    }

    fn log_decision(&self, loop_: &ReviewLoop, mode: &str, reason: &str, result: &ClassifyResult) {
        tracing::info!(
            review_loop_id = %loop_.id,
            pr_url = %loop_.pr_url,
            mode,
            reason,
            iteration = loop_.iteration,
            sha = %loop_.last_commit_sha,
            digest = loop_.last_feedback_digest.as_deref().unwrap_or(""),
            new = result.new_count,
            repeated = result.repeated_count,
            dismissed = result.resolved_count,
            dispatchable = result.dispatchable.len(),
            "Review feedback dispatch decision"
        );
    }
}

fn coderabbit_reports_zero_comments(body: &str) -> bool {
    body.to_lowercase().contains("actionable comments posted: 0")
}

fn build_followup_prompt(loop_: &ReviewLoop, findings: &[ReviewFinding]) -> String {
    let mut body = String::from("Address the following review feedback. Do not create a new pull request; continue working on the existing branch.\n\n");
    body.push_str(&format!("pull_request_url: {}\n\n", loop_.pr_url));
    for f in findings {
        let location = match (&f.path, f.line) {
            (Some(p), Some(l)) => format!("{p}:{l}"),
            (Some(p), None) => p.clone(),
            _ => "general".to_string(),
        };
        body.push_str(&format!("- [{location}] ({}) {}\n", f.reviewer_login, f.actionable_text));
    }
    body
}

fn phase_wire_name(phase: ReviewPhase) -> &'static str {
    match phase {
        ReviewPhase::RequestingReview => "requesting_review",
        ReviewPhase::AwaitingReview => "awaiting_review",
        ReviewPhase::CursorFixing => "cursor_fixing",
        ReviewPhase::Approved => "approved",
        ReviewPhase::HumanReview => "human_review",
        ReviewPhase::Complete => "complete",
        ReviewPhase::MaxIterations => "max_iterations",
        ReviewPhase::Failed => "failed",
    }
}

/// `https://github.com/{owner}/{repo}/pull/{number}` → `(owner, repo, number)`.
fn parse_pr_url(pr_url: &str) -> Option<(String, String, u64)> {
    let trimmed = pr_url.trim_end_matches('/');
    let parts: Vec<&str> = trimmed.rsplitn(4, '/').collect();
    if parts.len() < 4 || parts[1] != "pull" {
        return None;
    }
    let number: u64 = parts[0].parse().ok()?;
    let repo = parts[2].to_string();
    let owner = parts[3].rsplit('/').next()?.to_string();
    Some((owner, repo, number))
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
