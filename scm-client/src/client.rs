//! Source-platform client (spec.md §4.D): thin, interface-mockable wrapper over a GitHub-shaped
//! pull-request surface. Grounded on the teacher's `gh` sub-crate's octocrab dependency; unlike
//! [`agent_client::Client`] this layer adds no retry policy of its own (spec.md §4.D "no retries
//! beyond the platform's standard client").

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ScmError;
use crate::types::{IssueComment, PullRequest, Review, ReviewComment};

#[async_trait]
pub trait ScmClient: Send + Sync {
    async fn list_review_comments(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<ReviewComment>, ScmError>;
    async fn list_reviews(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<Review>, ScmError>;
    async fn list_issue_comments(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<IssueComment>, ScmError>;
    async fn request_reviewers(&self, owner: &str, repo: &str, pr_number: u64, reviewers: &[String], deadline: Duration) -> Result<(), ScmError>;
    async fn mark_pr_ready_for_review(&self, owner: &str, repo: &str, pr_node_id: &str, deadline: Duration) -> Result<(), ScmError>;
    async fn create_comment(&self, owner: &str, repo: &str, pr_number: u64, body: &str, deadline: Duration) -> Result<(), ScmError>;
    async fn reply_to_review_comment(&self, owner: &str, repo: &str, pr_number: u64, comment_id: u64, body: &str, deadline: Duration) -> Result<(), ScmError>;
    async fn get_pull_request_by_branch(&self, owner: &str, repo: &str, branch: &str, deadline: Duration) -> Result<PullRequest, ScmError>;
}

pub struct OctocrabScmClient {
    octocrab: octocrab::Octocrab,
}

impl OctocrabScmClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ScmError> {
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| ScmError::Request(e.to_string()))?;
        Ok(Self { octocrab })
    }

    async fn with_deadline<T>(
        deadline: Duration,
        fut: impl std::future::Future<Output = Result<T, octocrab::Error>>,
    ) -> Result<T, ScmError> {
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(ScmError::Request(e.to_string())),
            Err(_) => Err(ScmError::DeadlineExceeded),
        }
    }
}

#[async_trait]
impl ScmClient for OctocrabScmClient {
    async fn list_review_comments(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<ReviewComment>, ScmError> {
        let page = Self::with_deadline(deadline, self.octocrab.pulls(owner, repo).list_comments(Some(pr_number)).send()).await?;
        Ok(page
            .items
            .into_iter()
            .map(|c| ReviewComment {
                id: c.id.into_inner(),
                node_id: c.node_id,
                body: c.body,
                path: c.path,
                line: c.line.map(|l| l as u32),
                commit_id: c.commit_id,
                user_login: c.user.map(|u| u.login).unwrap_or_default(),
                html_url: c.html_url.to_string(),
            })
            .collect())
    }

    async fn list_reviews(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<Review>, ScmError> {
        let page = Self::with_deadline(deadline, self.octocrab.pulls(owner, repo).list_reviews(pr_number)).await?;
        Ok(page
            .items
            .into_iter()
            .map(|r| Review {
                id: r.id.into_inner(),
                body: r.body.unwrap_or_default(),
                state: match r.state {
                    Some(octocrab::models::pulls::ReviewState::Approved) => crate::types::ReviewState::Approved,
                    Some(octocrab::models::pulls::ReviewState::ChangesRequested) => crate::types::ReviewState::ChangesRequested,
                    Some(octocrab::models::pulls::ReviewState::Commented) => crate::types::ReviewState::Commented,
                    Some(octocrab::models::pulls::ReviewState::Dismissed) => crate::types::ReviewState::Dismissed,
                    _ => crate::types::ReviewState::Pending,
                },
                user_login: r.user.map(|u| u.login).unwrap_or_default(),
                commit_id: r.commit_id.unwrap_or_default(),
                html_url: r.html_url.to_string(),
                submitted_at: r.submitted_at.map(|t| t.to_rfc3339()),
            })
            .collect())
    }

    async fn list_issue_comments(&self, owner: &str, repo: &str, pr_number: u64, deadline: Duration) -> Result<Vec<IssueComment>, ScmError> {
        let page = Self::with_deadline(deadline, self.octocrab.issues(owner, repo).list_comments(pr_number).send()).await?;
        Ok(page
            .items
            .into_iter()
            .map(|c| IssueComment {
                id: c.id.into_inner(),
                node_id: c.node_id,
                body: c.body.unwrap_or_default(),
                user_login: c.user.login,
                html_url: c.html_url.to_string(),
            })
            .collect())
    }

    async fn request_reviewers(&self, owner: &str, repo: &str, pr_number: u64, reviewers: &[String], deadline: Duration) -> Result<(), ScmError> {
        Self::with_deadline(
            deadline,
            self.octocrab
                .pulls(owner, repo)
                .request_reviews(pr_number, reviewers.to_vec(), Vec::new()),
        )
        .await?;
        Ok(())
    }

    async fn mark_pr_ready_for_review(&self, owner: &str, repo: &str, pr_node_id: &str, deadline: Duration) -> Result<(), ScmError> {
        // No REST endpoint exists for this; it is GraphQL-only.
        let _ = (owner, repo);
        let query = json!({
            "query": "mutation($id: ID!) { markPullRequestReadyForReview(input: { pullRequestId: $id }) { clientMutationId } }",
            "variables": { "id": pr_node_id },
        });
        Self::with_deadline(deadline, self.octocrab.graphql::<serde_json::Value>(&query)).await?;
        Ok(())
    }

    async fn create_comment(&self, owner: &str, repo: &str, pr_number: u64, body: &str, deadline: Duration) -> Result<(), ScmError> {
        Self::with_deadline(deadline, self.octocrab.issues(owner, repo).create_comment(pr_number, body)).await?;
        Ok(())
    }

    async fn reply_to_review_comment(&self, owner: &str, repo: &str, pr_number: u64, comment_id: u64, body: &str, deadline: Duration) -> Result<(), ScmError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/comments/{comment_id}/replies");
        Self::with_deadline(deadline, self.octocrab.post(route, Some(&json!({ "body": body })))).await
            .map(|_: serde_json::Value| ())
    }

    async fn get_pull_request_by_branch(&self, owner: &str, repo: &str, branch: &str, deadline: Duration) -> Result<PullRequest, ScmError> {
        let head = format!("{owner}:{branch}");
        let page = Self::with_deadline(deadline, self.octocrab.pulls(owner, repo).list().head(head).send()).await?;
        let pr = page.items.into_iter().next().ok_or_else(|| ScmError::NoPullRequestForBranch(branch.to_string()))?;
        Ok(PullRequest {
            number: pr.number,
            node_id: pr.node_id.unwrap_or_default(),
            html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
            head_sha: pr.head.sha,
            head_ref: pr.head.ref_field,
            base_ref: pr.base.ref_field,
            draft: pr.draft.unwrap_or(false),
            state: pr.state.map(|s| format!("{s:?}")).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockScmClient {
        pr: PullRequest,
    }

    #[async_trait]
    impl ScmClient for MockScmClient {
        async fn list_review_comments(&self, _owner: &str, _repo: &str, _pr_number: u64, _deadline: Duration) -> Result<Vec<ReviewComment>, ScmError> {
            Ok(Vec::new())
        }
        async fn list_reviews(&self, _owner: &str, _repo: &str, _pr_number: u64, _deadline: Duration) -> Result<Vec<Review>, ScmError> {
            Ok(Vec::new())
        }
        async fn list_issue_comments(&self, _owner: &str, _repo: &str, _pr_number: u64, _deadline: Duration) -> Result<Vec<IssueComment>, ScmError> {
            Ok(Vec::new())
        }
        async fn request_reviewers(&self, _owner: &str, _repo: &str, _pr_number: u64, _reviewers: &[String], _deadline: Duration) -> Result<(), ScmError> {
            Ok(())
        }
        async fn mark_pr_ready_for_review(&self, _owner: &str, _repo: &str, _pr_node_id: &str, _deadline: Duration) -> Result<(), ScmError> {
            Ok(())
        }
        async fn create_comment(&self, _owner: &str, _repo: &str, _pr_number: u64, _body: &str, _deadline: Duration) -> Result<(), ScmError> {
            Ok(())
        }
        async fn reply_to_review_comment(&self, _owner: &str, _repo: &str, _pr_number: u64, _comment_id: u64, _body: &str, _deadline: Duration) -> Result<(), ScmError> {
            Ok(())
        }
        async fn get_pull_request_by_branch(&self, _owner: &str, _repo: &str, _branch: &str, _deadline: Duration) -> Result<PullRequest, ScmError> {
            Ok(self.pr.clone())
        }
    }

    #[tokio::test]
    async fn mock_client_satisfies_trait_object_use() {
        let client: std::sync::Arc<dyn ScmClient> = std::sync::Arc::new(MockScmClient {
            pr: PullRequest {
                number: 1,
                node_id: "PR_kwDOABCD1".into(),
                html_url: "https://github.com/o/r/pull/1".into(),
                head_sha: "sha1".into(),
                head_ref: "cursor/fix".into(),
                base_ref: "main".into(),
                draft: false,
                state: "open".into(),
            },
        });
        let pr = client.get_pull_request_by_branch("o", "r", "cursor/fix", Duration::from_secs(15)).await.unwrap();
        assert_eq!(pr.number, 1);
    }
}
