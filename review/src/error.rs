#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
    #[error("source-platform error: {0}")]
    Scm(#[from] scm_client::ScmError),
    #[error("remote-agent error: {0}")]
    Agent(#[from] agent_client::ClientError),
    #[error("chat host error: {0}")]
    ChatHost(#[from] chat_host::ChatHostError),
    #[error("review loop not found: {0}")]
    LoopNotFound(String),
}
