//! Feedback extraction pipeline (spec.md §4.J): turns raw review comments/reviews/issue
//! comments into actionable findings, dropping noise along the way.

use scm_client::{IssueComment, Review, ReviewComment};
use store::{ReviewLoop, ReviewPhase, ReviewerType, SourceType};

pub const CODERABBIT_LOGIN: &str = "coderabbitai[bot]";

const REVIEW_COMMENT_MARKER: &str = "prompt for ai agents";
const REVIEW_BODY_MARKER: &str = "prompt for all review comments with ai agents";

/// Boundary heuristic for where a CodeRabbit "Prompt for AI Agents" block ends (open question
/// #2 in DESIGN.md): a line starting with "Verify each finding", a markdown `## ` heading, or
/// end of input.
pub mod coderabbit {
    pub const BOUNDARY_MARKERS: &[&str] = &["verify each finding", "## "];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    CoderabbitMarkersMissing,
    NonCoderabbitNonInlineSource,
    NormalizedEmpty,
    ActionableEmpty,
    StaleCommitSha,
    WrongReviewerForPhase,
    CursorRelayComment,
}

/// A feedback source before route-selection/normalization has been applied.
pub struct RawCandidate {
    pub source_type: SourceType,
    pub source_id: String,
    pub source_url: String,
    pub source_node_id: Option<String>,
    pub reviewer_login: String,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub commit_sha: String,
    pub raw_text: String,
}

pub fn candidates_from(review_comments: &[ReviewComment], reviews: &[Review], issue_comments: &[IssueComment]) -> Vec<RawCandidate> {
    let mut out = Vec::with_capacity(review_comments.len() + reviews.len() + issue_comments.len());
    for c in review_comments {
        out.push(RawCandidate {
            source_type: SourceType::ReviewComment,
            source_id: c.id.to_string(),
            source_url: c.html_url.clone(),
            source_node_id: Some(c.node_id.clone()),
            reviewer_login: c.user_login.clone(),
            path: Some(c.path.clone()),
            line: c.line,
            commit_sha: c.commit_id.clone(),
            raw_text: c.body.clone(),
        });
    }
    for r in reviews {
        if r.body.trim().is_empty() {
            continue;
        }
        out.push(RawCandidate {
            source_type: SourceType::ReviewBody,
            source_id: r.id.to_string(),
            source_url: r.html_url.clone(),
            source_node_id: None,
            reviewer_login: r.user_login.clone(),
            path: None,
            line: None,
            commit_sha: r.commit_id.clone(),
            raw_text: r.body.clone(),
        });
    }
    for c in issue_comments {
        out.push(RawCandidate {
            source_type: SourceType::IssueComment,
            source_id: c.id.to_string(),
            source_url: c.html_url.clone(),
            source_node_id: Some(c.node_id.clone()),
            reviewer_login: c.user_login.clone(),
            path: None,
            line: None,
            commit_sha: String::new(),
            raw_text: c.body.clone(),
        });
    }
    out
}

/// A candidate that survived route-selection, normalization, and both filters.
pub struct ExtractedFinding {
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
}

pub fn extract(review_loop: &ReviewLoop, candidates: Vec<RawCandidate>, ai_reviewer_bots: &[String]) -> Vec<ExtractedFinding> {
    let mut out = Vec::new();
    for cand in candidates {
        let reviewer_type = classify_reviewer(&cand.reviewer_login, ai_reviewer_bots);
        let is_coderabbit = cand.reviewer_login.trim().eq_ignore_ascii_case(CODERABBIT_LOGIN);

        let normalized = normalize(&cand.raw_text);
        if normalized.is_empty() {
            log_drop(review_loop, &cand, reviewer_type, DropReason::NormalizedEmpty, "", 0);
            continue;
        }

        let actionable = if is_coderabbit {
            let marker = match cand.source_type {
                SourceType::ReviewComment => REVIEW_COMMENT_MARKER,
                _ => REVIEW_BODY_MARKER,
            };
            match extract_coderabbit_actionable(&normalized, marker) {
                Some(text) => text,
                None => {
                    log_drop(review_loop, &cand, reviewer_type, DropReason::CoderabbitMarkersMissing, &normalized, 0);
                    continue;
                }
            }
        } else if cand.source_type == SourceType::ReviewComment {
            normalized.clone()
        } else {
            log_drop(review_loop, &cand, reviewer_type, DropReason::NonCoderabbitNonInlineSource, &normalized, 0);
            continue;
        };

        if actionable.trim().is_empty() {
            log_drop(review_loop, &cand, reviewer_type, DropReason::ActionableEmpty, &normalized, actionable.len());
            continue;
        }

        if review_loop.phase == ReviewPhase::AwaitingReview && !cand.commit_sha.is_empty() && cand.commit_sha != review_loop.last_commit_sha {
            log_drop(review_loop, &cand, reviewer_type, DropReason::StaleCommitSha, &normalized, actionable.len());
            continue;
        }

        match review_loop.phase {
            ReviewPhase::AwaitingReview if reviewer_type != ReviewerType::AiBot => {
                log_drop(review_loop, &cand, reviewer_type, DropReason::WrongReviewerForPhase, &normalized, actionable.len());
                continue;
            }
            ReviewPhase::HumanReview if reviewer_type != ReviewerType::Human => {
                log_drop(review_loop, &cand, reviewer_type, DropReason::WrongReviewerForPhase, &normalized, actionable.len());
                continue;
            }
            ReviewPhase::HumanReview if is_cursor_relay_comment(&actionable) => {
                log_drop(review_loop, &cand, reviewer_type, DropReason::CursorRelayComment, &normalized, actionable.len());
                continue;
            }
            _ => {}
        }

        out.push(ExtractedFinding {
            source_type: cand.source_type,
            source_id: cand.source_id,
            source_url: cand.source_url,
            source_node_id: cand.source_node_id,
            reviewer_login: cand.reviewer_login,
            reviewer_type,
            path: cand.path,
            line: cand.line,
            commit_sha: cand.commit_sha,
            raw_text: cand.raw_text,
            actionable_text: actionable,
        });
    }
    out
}

fn classify_reviewer(login: &str, ai_reviewer_bots: &[String]) -> ReviewerType {
    let lower = login.trim().to_lowercase();
    if lower == CODERABBIT_LOGIN || ai_reviewer_bots.iter().any(|b| b.trim().to_lowercase() == lower) {
        ReviewerType::AiBot
    } else {
        ReviewerType::Human
    }
}

fn is_cursor_relay_comment(text: &str) -> bool {
    text.trim_start().to_lowercase().starts_with("@cursor")
}

/// Trim + collapse runs of 3+ blank lines down to 2 (spec.md §4.J normalization step).
fn normalize(raw: &str) -> String {
    let lines: Vec<&str> = raw.trim().lines().collect();
    let mut out_lines: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;
    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out_lines.push("");
            }
        } else {
            blank_run = 0;
            out_lines.push(line);
        }
    }
    out_lines.join("\n").trim().to_string()
}

fn strip_markdown_wrapper(line: &str) -> String {
    line.trim().trim_matches(|c| c == '*' || c == '_' || c == '`' || c == '#').trim().to_string()
}

fn extract_coderabbit_actionable(normalized: &str, marker: &str) -> Option<String> {
    let lines: Vec<&str> = normalized.lines().collect();
    let marker_idx = lines.iter().position(|l| strip_markdown_wrapper(l).eq_ignore_ascii_case(marker))?;
    let mut collected = Vec::new();
    for line in &lines[marker_idx + 1..] {
        let lower = line.trim().to_lowercase();
        if coderabbit::BOUNDARY_MARKERS.iter().any(|b| lower.starts_with(b)) {
            break;
        }
        collected.push(*line);
    }
    let text = collected.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn log_drop(loop_: &ReviewLoop, cand: &RawCandidate, reviewer_type: ReviewerType, reason: DropReason, normalized: &str, actionable_len: usize) {
    tracing::debug!(
        review_loop_id = %loop_.id,
        pr_url = %loop_.pr_url,
        phase = ?loop_.phase,
        iteration = loop_.iteration,
        source_type = ?cand.source_type,
        source_id = %cand.source_id,
        source_url = %cand.source_url,
        reviewer_login = %cand.reviewer_login,
        reviewer_type = ?reviewer_type,
        path = ?cand.path,
        line = ?cand.line,
        commit_sha = %cand.commit_sha,
        raw_len = cand.raw_text.len(),
        normalized_len = normalized.len(),
        actionable_len,
        drop_reason = ?reason,
        "dropped review feedback candidate"
    );
}
