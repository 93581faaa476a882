//! Fingerprinting and digesting for the review-feedback pipeline (spec.md §4.J, §9 "Idempotency
//! digest").

use sha2::{Digest, Sha256};
use store::{ReviewFinding, ReviewerType, SourceType};

/// Identity of a finding for dedup purposes. Deliberately excludes `source_url`: a reviewer
/// restating the same thing under a fresh review URL is a repeat, not a new finding.
pub fn fingerprint(source_type: SourceType, path: Option<&str>, line: Option<u32>, reviewer_type: ReviewerType, actionable_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{source_type:?}|{path:?}|{line:?}|{reviewer_type:?}|").as_bytes());
    hasher.update(canonicalize(actionable_text).as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(text: &str) -> String {
    text.trim().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Stable digest over a dispatchable bundle, used as one half of the dispatch idempotency guard
/// (spec.md §4.J: "unchanged tuple means skip"). Sorted so input order never matters.
pub fn compute_digest(findings: &[&ReviewFinding]) -> String {
    let mut keys: Vec<&str> = findings.iter().map(|f| f.key.as_str()).collect();
    keys.sort_unstable();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.trim().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::FindingStatus;

    fn finding(key: &str) -> ReviewFinding {
        ReviewFinding {
            key: key.to_string(),
            status: FindingStatus::Open,
            source_type: SourceType::ReviewComment,
            source_id: "1".into(),
            source_url: "https://x/1".into(),
            source_node_id: None,
            reviewer_login: "r".into(),
            reviewer_type: ReviewerType::AiBot,
            path: Some("a.rs".into()),
            line: Some(1),
            commit_sha: "sha1".into(),
            raw_text: "t".into(),
            actionable_text: "fix it".into(),
            first_seen_at: 0,
            last_seen_at: 0,
            first_seen_iteration: 1,
            last_seen_iteration: 1,
        }
    }

    #[test]
    fn fingerprint_ignores_source_url() {
        let a = fingerprint(SourceType::ReviewComment, Some("a.rs"), Some(1), ReviewerType::AiBot, "Fix the bug");
        let b = fingerprint(SourceType::ReviewComment, Some("a.rs"), Some(1), ReviewerType::AiBot, "fix   the bug");
        assert_eq!(a, b, "whitespace/case differences canonicalize to the same key");
    }

    #[test]
    fn fingerprint_differs_by_location() {
        let a = fingerprint(SourceType::ReviewComment, Some("a.rs"), Some(1), ReviewerType::AiBot, "fix it");
        let b = fingerprint(SourceType::ReviewComment, Some("a.rs"), Some(2), ReviewerType::AiBot, "fix it");
        assert_ne!(a, b);
    }

    #[test]
    fn compute_digest_is_order_independent() {
        let f1 = finding("k1");
        let f2 = finding("k2");
        let d1 = compute_digest(&[&f1, &f2]);
        let d2 = compute_digest(&[&f2, &f1]);
        assert_eq!(d1, d2);
    }

    #[test]
    fn compute_digest_changes_with_findings() {
        let f1 = finding("k1");
        let f2 = finding("k2");
        let f3 = finding("k3");
        assert_ne!(compute_digest(&[&f1, &f2]), compute_digest(&[&f1, &f3]));
    }
}
