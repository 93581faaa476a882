#[derive(Debug, thiserror::Error)]
pub enum ChatHostError {
    #[error("chat host request failed: {0}")]
    Request(String),
    #[error("post not found: {0}")]
    PostNotFound(String),
}
