use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentcomm_types::{Agent, AgentEvent, Message, Task};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::delivery::{DeliveryCoordinator, DeliveryMode, DeliveryStream};
use crate::error::ClientError;
use crate::registry::AgentRegistry;

/// Active-task map entry: which agent owns the task, and its folded state.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub agent_id: String,
    pub task: Task,
}

/// Per-send options for [`CommunicationManager::send`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Context id to continue an existing conversation.
    pub context_id: Option<String>,
    /// Task id to continue an existing task.
    pub task_id: Option<String>,
    /// Delivery strategy override; derived from capabilities when absent.
    pub mode: Option<DeliveryMode>,
}

/// Fan-out layer managing many concurrent (agent, task) pairs.
///
/// Owns the active-task map and the in-process subscriber channels (distinct
/// from the webhook registry — these are local listeners, e.g. for UI
/// refresh). Entries are evicted only by explicit cleanup; the protocol
/// defines no task deletion.
pub struct CommunicationManager {
    registry: Arc<dyn AgentRegistry>,
    coordinator: Arc<DeliveryCoordinator>,
    active_tasks: Mutex<HashMap<String, ActiveTask>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<AgentEvent>>>>,
}

impl CommunicationManager {
    pub fn new(registry: Arc<dyn AgentRegistry>, coordinator: Arc<DeliveryCoordinator>) -> Self {
        Self {
            registry,
            coordinator,
            active_tasks: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, ActiveTask>> {
        self.active_tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn subs(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Vec<mpsc::UnboundedSender<AgentEvent>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Send a message to an agent and stream the folded events.
    ///
    /// An unknown agent id yields a single error event. Every event is
    /// folded into the active-task map and forwarded to the task's
    /// subscribers before reaching the caller.
    pub fn send(
        self: &Arc<Self>,
        agent_id: &str,
        message: Message,
        options: SendOptions,
    ) -> DeliveryStream {
        let (tx, rx) = mpsc::unbounded_channel();

        match self.registry.get_agent(agent_id) {
            None => {
                tracing::error!(agent_id, "agent not found");
                let e = ClientError::AgentNotFound(agent_id.to_string());
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
            }
            Some(agent) => {
                let manager = self.clone();
                tokio::spawn(async move {
                    manager.run_send(agent, message, options, tx).await;
                });
            }
        }

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    async fn run_send(
        self: Arc<Self>,
        agent: Agent,
        message: Message,
        options: SendOptions,
        tx: mpsc::UnboundedSender<AgentEvent>,
    ) {
        let mut message = message.prepared(options.context_id.as_deref());
        if message.task_id.is_none() {
            message.task_id = options.task_id;
        }

        let mut events = self.coordinator.deliver(&agent, message, options.mode);
        while let Some(event) = events.next().await {
            self.fold(&agent.id, &event);
            self.notify(&event);
            // Keep folding when the caller has gone away so the active-task
            // map stays canonical for subscribers.
            let _ = tx.send(event);
        }
    }

    /// Apply one event to the active-task map.
    fn fold(&self, agent_id: &str, event: &AgentEvent) {
        match event {
            AgentEvent::Task(task) => {
                self.tasks().insert(
                    task.id.clone(),
                    ActiveTask {
                        agent_id: agent_id.to_string(),
                        task: task.clone(),
                    },
                );
            }
            AgentEvent::StatusUpdate(update) => {
                if let Some(entry) = self.tasks().get_mut(&update.task_id) {
                    entry.task.apply_status_update(update);
                }
            }
            AgentEvent::ArtifactUpdate(update) => {
                if let Some(entry) = self.tasks().get_mut(&update.task_id) {
                    entry.task.apply_artifact_update(update);
                }
            }
            AgentEvent::Message(_) | AgentEvent::Error(_) => {}
        }
    }

    /// Forward an event to every subscriber of its task, pruning closed
    /// channels. One dead subscriber never blocks the others.
    fn notify(&self, event: &AgentEvent) {
        let Some(task_id) = event.task_id() else {
            return;
        };
        let mut subs = self.subs();
        let Some(senders) = subs.get_mut(task_id) else {
            return;
        };
        senders.retain(|sender| match sender.send(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(task_id, "dropping closed subscriber: {e}");
                false
            }
        });
        if senders.is_empty() {
            subs.remove(task_id);
        }
    }

    /// Subscribe to every folded event for a task id.
    pub fn subscribe(&self, task_id: &str) -> mpsc::UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subs().entry(task_id.to_string()).or_default().push(tx);
        rx
    }

    /// Drop every subscriber for a task id.
    pub fn unsubscribe(&self, task_id: &str) {
        self.subs().remove(task_id);
    }

    /// Cancel a task that is in the active map.
    ///
    /// An unknown task id is an error, not a no-op.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, ClientError> {
        let agent_id = self
            .tasks()
            .get(task_id)
            .map(|entry| entry.agent_id.clone())
            .ok_or_else(|| ClientError::TaskNotFound(task_id.to_string()))?;
        let agent = self
            .registry
            .get_agent(&agent_id)
            .ok_or_else(|| ClientError::AgentNotFound(agent_id.clone()))?;

        let cancelled = self.coordinator.cancel_task(&agent, task_id).await?;

        let updated = {
            let mut tasks = self.tasks();
            match tasks.get_mut(task_id) {
                Some(entry) => {
                    if entry
                        .task
                        .status
                        .state
                        .can_transition_to(cancelled.status.state)
                    {
                        entry.task.status = cancelled.status.clone();
                    }
                    entry.task.clone()
                }
                None => cancelled.clone(),
            }
        };
        self.notify(&AgentEvent::Task(updated));
        Ok(cancelled)
    }

    /// The folded task for an id, if it is active.
    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks().get(task_id).map(|entry| entry.task.clone())
    }

    /// Snapshot of the active-task map.
    pub fn active_tasks(&self) -> HashMap<String, ActiveTask> {
        self.tasks().clone()
    }

    /// Explicit client-side cleanup of a finished task.
    pub fn evict_task(&self, task_id: &str) -> Option<ActiveTask> {
        self.subs().remove(task_id);
        self.tasks().remove(task_id)
    }
}
