//! Fingerprint-based finding classification (spec.md §4.J): partitions extracted candidates
//! against the loop's existing findings into new/repeated/resolved/superseded.

use std::collections::{HashMap, HashSet};

use store::{FindingStatus, ReviewFinding, ReviewerType};

use crate::digest::fingerprint;
use crate::extract::ExtractedFinding;

pub struct ClassifyResult {
    /// Every finding that changed status or needs a fresh `last_seen_*` stamp; callers should
    /// `upsert_finding` each of these back onto the loop.
    pub updated_findings: Vec<ReviewFinding>,
    /// The subset that should actually be sent to the agent: new ∪ repeated.
    pub dispatchable: Vec<ReviewFinding>,
    pub new_count: usize,
    pub repeated_count: usize,
    pub resolved_count: usize,
    pub superseded_count: usize,
}

/// `existing` should be the loop's full `findings` list (status filtering happens internally).
pub fn classify(existing: &[ReviewFinding], candidates: Vec<ExtractedFinding>, iteration: u32, now_ms: i64) -> ClassifyResult {
    let open: HashMap<String, ReviewFinding> = existing.iter().filter(|f| f.status == FindingStatus::Open).map(|f| (f.key.clone(), f.clone())).collect();

    let mut by_location: HashMap<(Option<String>, Option<u32>, ReviewerType), String> = HashMap::new();
    for f in open.values() {
        by_location.insert((f.path.clone(), f.line, f.reviewer_type), f.key.clone());
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut superseded_keys: HashSet<String> = HashSet::new();
    let mut updated = Vec::new();
    let mut dispatchable = Vec::new();
    let mut new_count = 0usize;
    let mut repeated_count = 0usize;

    for cand in candidates {
        let key = fingerprint(cand.source_type, cand.path.as_deref(), cand.line, cand.reviewer_type, &cand.actionable_text);
        seen.insert(key.clone());

        if let Some(mut existing_finding) = open.get(&key).cloned() {
            existing_finding.last_seen_at = now_ms;
            existing_finding.last_seen_iteration = iteration;
            existing_finding.source_url = cand.source_url;
            repeated_count += 1;
            updated.push(existing_finding.clone());
            dispatchable.push(existing_finding);
            continue;
        }

        let location = (cand.path.clone(), cand.line, cand.reviewer_type);
        if let Some(old_key) = by_location.get(&location) {
            if old_key != &key && !superseded_keys.contains(old_key) {
                if let Some(mut old) = open.get(old_key).cloned() {
                    old.status = FindingStatus::Superseded;
                    updated.push(old);
                    superseded_keys.insert(old_key.clone());
                }
            }
        }

        let finding = ReviewFinding {
            key: key.clone(),
            status: FindingStatus::Open,
            source_type: cand.source_type,
            source_id: cand.source_id,
            source_url: cand.source_url,
            source_node_id: cand.source_node_id,
            reviewer_login: cand.reviewer_login,
            reviewer_type: cand.reviewer_type,
            path: cand.path,
            line: cand.line,
            commit_sha: cand.commit_sha,
            raw_text: cand.raw_text,
            actionable_text: cand.actionable_text,
            first_seen_at: now_ms,
            last_seen_at: now_ms,
            first_seen_iteration: iteration,
            last_seen_iteration: iteration,
        };
        new_count += 1;
        updated.push(finding.clone());
        dispatchable.push(finding);
    }

    let mut resolved_count = 0usize;
    for (key, finding) in open.iter() {
        if !seen.contains(key) && !superseded_keys.contains(key) {
            let mut resolved = finding.clone();
            resolved.status = FindingStatus::Resolved;
            updated.push(resolved);
            resolved_count += 1;
        }
    }

    ClassifyResult {
        updated_findings: updated,
        dispatchable,
        new_count,
        repeated_count,
        resolved_count,
        superseded_count: superseded_keys.len(),
    }
}
