/// Errors surfaced by the source-platform client (spec.md §4.D, §7 "Source-platform error").
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("source platform request failed: {0}")]
    Request(String),
    #[error("source platform call exceeded its deadline")]
    DeadlineExceeded,
    #[error("pull request not found for branch {0}")]
    NoPullRequestForBranch(String),
}
