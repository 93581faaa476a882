#[derive(Debug, thiserror::Error)]
pub enum HitlError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
    #[error("chat host error: {0}")]
    ChatHost(#[from] chat_host::ChatHostError),
    #[error("remote-agent error: {0}")]
    Agent(#[from] agent_client::ClientError),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("workflow {0} is not in the expected phase (found {1:?})")]
    WrongPhase(String, store::WorkflowPhase),
}
