use agentcomm_types::JsonRpcError;

/// Client-side errors for outbound agent communication.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON-RPC error: code={}, message={}", .0.code, .0.message)]
    JsonRpc(JsonRpcError),

    #[error("Empty result in JSON-RPC response")]
    EmptyResult,

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("No task to cancel")]
    NoActiveTask,

    #[error("Invalid auth header: {0}")]
    InvalidAuthHeader(String),

    #[error("Webhook delivery unavailable: {0}")]
    WebhookUnavailable(String),
}

impl ClientError {
    /// Whether the streaming path may retry after this failure.
    ///
    /// Transient: HTTP 503, connection-level failures, timeouts. Everything
    /// else propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.status() == Some(reqwest::StatusCode::SERVICE_UNAVAILABLE)
                    || e.is_connect()
                    || e.is_timeout()
                    || e.to_string().contains("connection")
            }
            _ => false,
        }
    }

    /// Wire form used when embedding a failure into an event stream.
    ///
    /// HTTP failures carry their status code; everything else uses the
    /// generic -1 code.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            ClientError::JsonRpc(e) => e.clone(),
            ClientError::Http(e) => JsonRpcError {
                code: e.status().map(|s| s.as_u16() as i32).unwrap_or(-1),
                message: format!("HTTP error: {e}"),
                data: None,
            },
            other => JsonRpcError {
                code: -1,
                message: format!("Error: {other}"),
                data: None,
            },
        }
    }
}
