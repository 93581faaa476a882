//! Key-naming scheme for the kv layer, and the PR-URL normalization used wherever a PR URL is
//! a lookup key (spec.md §3 "PR URLs are normalized by stripping a trailing slash before use
//! as an index key").

/// Strips a single trailing slash so `.../pull/1` and `.../pull/1/` collide on the same index
/// entry.
pub fn normalize_pr_url(pr_url: &str) -> String {
    pr_url.strip_suffix('/').unwrap_or(pr_url).to_string()
}

pub fn agent_key(id: &str) -> String {
    format!("agent:{id}")
}

pub fn workflow_key(id: &str) -> String {
    format!("workflow:{id}")
}

pub fn review_loop_key(id: &str) -> String {
    format!("review_loop:{id}")
}

pub fn channel_settings_key(channel_id: &str) -> String {
    format!("channel_settings:{channel_id}")
}

pub fn user_settings_key(user_id: &str) -> String {
    format!("user_settings:{user_id}")
}

pub fn delivery_key(delivery_id: &str) -> String {
    format!("delivery:{delivery_id}")
}

pub fn idx_active_agent(agent_id: &str) -> String {
    format!("idx:active_agents:{agent_id}")
}

pub const IDX_ACTIVE_AGENTS_PREFIX: &str = "idx:active_agents:";

pub fn idx_finished_with_pr(agent_id: &str) -> String {
    format!("idx:finished_with_pr:{agent_id}")
}

pub const IDX_FINISHED_WITH_PR_PREFIX: &str = "idx:finished_with_pr:";

pub fn idx_user_agent(user_id: &str, agent_id: &str) -> String {
    format!("idx:user_agents:{user_id}:{agent_id}")
}

pub fn idx_user_agents_prefix(user_id: &str) -> String {
    format!("idx:user_agents:{user_id}:")
}

pub fn idx_pr_agent(normalized_pr_url: &str) -> String {
    format!("idx:pr_agent:{normalized_pr_url}")
}

pub fn idx_branch_agent(repository: &str, branch: &str) -> String {
    format!("idx:branch_agent:{repository}:{branch}")
}

pub fn idx_thread(thread_id: &str) -> String {
    format!("idx:thread:{thread_id}")
}

pub fn idx_agent_workflow(agent_id: &str) -> String {
    format!("idx:agent_workflow:{agent_id}")
}

pub fn idx_pr_review_loop(normalized_pr_url: &str) -> String {
    format!("idx:pr_review_loop:{normalized_pr_url}")
}

pub fn idx_agent_review_loop(agent_id: &str) -> String {
    format!("idx:agent_review_loop:{agent_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_one_trailing_slash_only() {
        assert_eq!(normalize_pr_url("https://x/pull/1/"), "https://x/pull/1");
        assert_eq!(normalize_pr_url("https://x/pull/1"), "https://x/pull/1");
        assert_eq!(normalize_pr_url("https://x/pull/1//"), "https://x/pull/1/");
    }

    #[test]
    fn keys_are_namespaced_and_disjoint() {
        assert_ne!(agent_key("1"), workflow_key("1"));
        assert!(idx_active_agent("a1").starts_with(IDX_ACTIVE_AGENTS_PREFIX));
        assert!(idx_finished_with_pr("a1").starts_with(IDX_FINISHED_WITH_PR_PREFIX));
        assert!(idx_user_agent("u1", "a1").starts_with(&idx_user_agents_prefix("u1")));
    }
}
