/// Errors from the webhook correlation server.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
