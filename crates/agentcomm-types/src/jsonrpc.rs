use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};
use crate::push::PushNotificationConfig;

/// RPC method names consumed by this subsystem.
pub const METHOD_MESSAGE_SEND: &str = "message/send";
pub const METHOD_MESSAGE_STREAM: &str = "message/stream";
pub const METHOD_TASKS_GET: &str = "tasks/get";
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";
/// Method agents use when POSTing to the webhook listener.
pub const METHOD_PUSH_NOTIFICATION: &str = "pushNotifications/send";

/// JSON-RPC 2.0 request ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
    Null,
}

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: JsonRpcId,
}

impl JsonRpcRequest {
    /// Build an envelope with a generated uuid request id.
    pub fn new(method: &str, params: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0".into(),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
            id: JsonRpcId::String(uuid::Uuid::new_v4().to_string()),
        })
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: JsonRpcId,
}

impl JsonRpcResponse {
    pub fn success(id: JsonRpcId, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

impl From<RpcErrorCode> for JsonRpcError {
    fn from(code: RpcErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().into(),
            data: None,
        }
    }
}

/// Well-known JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    TaskNotFound,
    Unauthorized,
}

impl RpcErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::TaskNotFound => -32001,
            RpcErrorCode::Unauthorized => -31403,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            RpcErrorCode::ParseError => "Parse error",
            RpcErrorCode::InvalidRequest => "Invalid request",
            RpcErrorCode::MethodNotFound => "Method not found",
            RpcErrorCode::InvalidParams => "Invalid params",
            RpcErrorCode::InternalError => "Internal error",
            RpcErrorCode::TaskNotFound => "Task not found",
            RpcErrorCode::Unauthorized => "Unauthorized",
        }
    }
}

// --- Request parameter types ---

/// Outbound wire shape of a message: text is carried as one `text`-kind part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub kind: String,
    pub message_id: String,
    pub role: Role,
    pub parts: Vec<WirePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePart {
    pub kind: String,
    pub text: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            kind: "message".into(),
            message_id: message
                .message_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role: message.role.unwrap_or(Role::User),
            parts: vec![WirePart {
                kind: "text".into(),
                text: message.content.clone(),
            }],
            context_id: message.context_id.clone(),
            task_id: message.task_id.clone(),
        }
    }
}

/// Parameters for `message/send` and `message/stream`.
///
/// Streaming requests carry no configuration — the connection itself is the
/// notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub message: WireMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendConfiguration>,
}

impl SendMessageParams {
    /// Params for the streaming path: bare message, no configuration.
    pub fn streaming(message: &Message) -> Self {
        Self {
            message: message.into(),
            configuration: None,
        }
    }

    /// Params for the blocking path, with an optional push config attached.
    pub fn blocking(message: &Message, push: Option<PushNotificationConfig>) -> Self {
        Self {
            message: message.into(),
            configuration: Some(SendConfiguration {
                blocking: Some(true),
                push_notification_config: push,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notification_config: Option<PushNotificationConfig>,
}

/// Parameters for `tasks/get` and `tasks/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdParams {
    pub id: String,
}
