/// Errors surfaced by the remote-agent client (spec.md §4.C, §7 "Remote-agent API error").
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A non-2xx HTTP response, with the raw body preserved for user-facing rendering.
    #[error("agent api error: status={status} message={message}")]
    Api {
        status: u16,
        message: String,
        raw_body: String,
    },
    /// Transport-level failure (connect, TLS, timeout) after retries were exhausted.
    #[error("agent api transport error: {0}")]
    Transport(String),
    /// The caller-supplied deadline elapsed before a retry could be attempted.
    #[error("agent api deadline exceeded")]
    DeadlineExceeded,
    #[error("agent api response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
