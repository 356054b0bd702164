use std::pin::Pin;
use std::sync::Arc;

use agentcomm_types::{Agent, AgentEvent, JsonRpcError, Message, Task};
use futures_core::Stream;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::delivery::DeliveryCoordinator;

/// Surface text when a send produced no content and no error.
pub const NO_RESPONSE_FALLBACK: &str =
    "Unable to get a response from the agent. Please try again.";

/// Per-agent conversation session state.
#[derive(Default)]
struct SessionState {
    context_id: Option<String>,
    last_response: Option<String>,
    last_task_id: Option<String>,
    task: Option<Task>,
    error: Option<JsonRpcError>,
}

impl SessionState {
    /// Fold one event into the session, returning the text chunk it
    /// contributes to the response.
    fn fold(&mut self, event: AgentEvent) -> String {
        if let Some(context_id) = event.context_id() {
            self.context_id = Some(context_id.to_string());
        }
        match event {
            AgentEvent::Message(message) => message.content,
            AgentEvent::Task(task) => {
                self.last_task_id = Some(task.id.clone());
                let chunk = task.artifact_text();
                self.task = Some(task);
                chunk
            }
            AgentEvent::StatusUpdate(update) => {
                if let Some(task) = &mut self.task {
                    task.apply_status_update(&update);
                }
                String::new()
            }
            AgentEvent::ArtifactUpdate(update) => {
                let chunk = update.artifact.text();
                if let Some(task) = &mut self.task {
                    task.apply_artifact_update(&update);
                }
                chunk
            }
            AgentEvent::Error(error) => {
                tracing::error!(code = error.code, "agent error: {}", error.message);
                self.error = Some(error);
                String::new()
            }
        }
    }
}

/// Response aggregator for one agent conversation.
///
/// Drives the delivery coordinator and folds the event stream into
/// accumulated text and a canonical task, tracking the context id from each
/// response so the next message continues the conversation.
pub struct AgentComm {
    agent: Agent,
    coordinator: Arc<DeliveryCoordinator>,
    state: Arc<Mutex<SessionState>>,
}

impl AgentComm {
    pub fn new(agent: Agent, coordinator: Arc<DeliveryCoordinator>) -> Self {
        Self {
            agent,
            coordinator,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Send a message and return the complete response text.
    ///
    /// Failures surface as response text (with the literal error message),
    /// never as a panic or error return.
    pub async fn send(&self, text: &str) -> String {
        let mut stream = self.send_stream(text).await;
        let mut response = String::new();
        while let Some(chunk) = stream.next().await {
            response.push_str(&chunk);
        }
        response
    }

    /// Send a message and stream response chunks as they arrive.
    ///
    /// The stream is finite and not restartable — call again to re-send.
    pub async fn send_stream(&self, text: &str) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        let message = {
            let state = self.state.lock().await;
            Message::user(text).prepared(state.context_id.as_deref())
        };

        let mut events = self.coordinator.deliver(&self.agent, message, None);
        let state = self.state.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut response_text = String::new();
            {
                let mut state = state.lock().await;
                state.error = None;
            }

            while let Some(event) = events.next().await {
                let chunk = {
                    let mut state = state.lock().await;
                    state.fold(event)
                };
                if !chunk.is_empty() {
                    response_text.push_str(&chunk);
                    // A closed consumer stops emission but not folding, so
                    // the session state stays canonical.
                    let _ = tx.send(chunk);
                }
            }

            let mut state = state.lock().await;
            if response_text.is_empty() {
                let fallback = match state.error.take() {
                    Some(error) => format!(
                        "Error communicating with agent: {}. Please try again.",
                        error.message
                    ),
                    None => {
                        tracing::warn!("no response text received from agent");
                        NO_RESPONSE_FALLBACK.to_string()
                    }
                };
                let _ = tx.send(fallback.clone());
                state.last_response = Some(fallback);
            } else {
                state.last_response = Some(response_text);
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    /// Request cancellation of the last known task.
    pub async fn cancel(&self) -> bool {
        let task_id = {
            let state = self.state.lock().await;
            state.last_task_id.clone()
        };
        let Some(task_id) = task_id else {
            tracing::error!("no task to cancel");
            return false;
        };

        match self.coordinator.cancel_task(&self.agent, &task_id).await {
            Ok(task) => {
                let mut state = self.state.lock().await;
                if let Some(stored) = &mut state.task {
                    if stored.status.state.can_transition_to(task.status.state) {
                        stored.status = task.status;
                    }
                }
                true
            }
            Err(e) => {
                tracing::error!(%task_id, "cancel failed: {e}");
                false
            }
        }
    }

    /// The last complete response, or an empty string before any send.
    pub async fn last_response(&self) -> String {
        self.state.lock().await.last_response.clone().unwrap_or_default()
    }

    /// The conversation context id carried into the next message.
    pub async fn context_id(&self) -> Option<String> {
        self.state.lock().await.context_id.clone()
    }

    pub async fn last_task_id(&self) -> Option<String> {
        self.state.lock().await.last_task_id.clone()
    }

    /// The canonical task folded from the most recent exchange.
    pub async fn task(&self) -> Option<Task> {
        self.state.lock().await.task.clone()
    }
}
