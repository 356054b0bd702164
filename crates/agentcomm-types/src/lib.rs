pub mod agent;
pub mod artifact;
pub mod event;
pub mod jsonrpc;
pub mod message;
pub mod push;
pub mod task;

// Convenience re-exports
pub use agent::{Agent, AgentAuthentication, AgentCapabilities, AuthType, TransportKind};
pub use artifact::{Artifact, Part, PartContent};
pub use event::{AgentEvent, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};
pub use jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, RpcErrorCode, SendConfiguration,
    SendMessageParams, TaskIdParams, WireMessage, WirePart, METHOD_MESSAGE_SEND,
    METHOD_MESSAGE_STREAM, METHOD_PUSH_NOTIFICATION, METHOD_TASKS_CANCEL, METHOD_TASKS_GET,
};
pub use message::{Message, Role};
pub use push::{PushAuthInfo, PushNotificationConfig};
pub use task::{Task, TaskState, TaskStatus};
