use std::pin::Pin;

use agentcomm_types::{AgentEvent, SendMessageParams, Task, TaskIdParams};
use futures_core::Stream;

use crate::error::ClientError;

/// A stream of decoded protocol events from a streaming response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, ClientError>> + Send>>;

/// Transport layer abstraction for agent communication.
///
/// Carries no task-lifecycle knowledge: it moves envelopes and frames, the
/// delivery coordinator decides what to do with them. Default
/// implementation: [`crate::JsonRpcTransport`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Blocking `message/send`; returns the single decoded response event.
    async fn send_message(&self, params: SendMessageParams) -> Result<AgentEvent, ClientError>;

    /// `message/stream`; returns a live SSE event stream.
    async fn send_message_stream(
        &self,
        params: SendMessageParams,
    ) -> Result<EventStream, ClientError>;

    /// `tasks/get`.
    async fn get_task(&self, params: TaskIdParams) -> Result<Task, ClientError>;

    /// `tasks/cancel`.
    async fn cancel_task(&self, params: TaskIdParams) -> Result<Task, ClientError>;
}
