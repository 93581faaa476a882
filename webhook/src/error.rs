#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("webhook secret not configured")]
    MissingSecret,
    #[error("body exceeds size cap")]
    BodyTooLarge,
    #[error("unparseable body: {0}")]
    Unparseable(String),
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
}
