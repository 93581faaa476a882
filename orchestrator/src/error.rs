#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
    #[error("chat host error: {0}")]
    ChatHost(#[from] chat_host::ChatHostError),
    #[error("remote-agent error: {0}")]
    Agent(#[from] agent_client::ClientError),
    #[error("source-platform error: {0}")]
    Scm(#[from] scm_client::ScmError),
    #[error("hitl error: {0}")]
    Hitl(#[from] hitl::HitlError),
    #[error("review error: {0}")]
    Review(#[from] review::ReviewError),
    #[error("no repository configured for this launch (mention, channel, user, and global defaults were all unset)")]
    NoRepository,
    #[error("agent {0} not found")]
    AgentNotFound(String),
    #[error("workflow {0} not found")]
    WorkflowNotFound(String),
    #[error("unrecognized action {0:?}")]
    UnknownAction(String),
    #[error("action {action} is missing the {field:?} field in its context")]
    MissingActionField { action: String, field: &'static str },
}
