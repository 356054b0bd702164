use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentcomm_types::{
    Agent, AgentEvent, Message, PushNotificationConfig, SendMessageParams, Task, TaskIdParams,
    TransportKind,
};
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use agentcomm_webhook::CallbackRegistry;

use crate::error::ClientError;
use crate::jsonrpc_transport::JsonRpcTransport;
use crate::transport::Transport;

/// How task progress is learned after sending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Streaming,
    Polling,
    Webhook,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Fixed delay between `tasks/get` attempts.
    pub poll_interval: Duration,
    /// Polling stops after this many attempts even without a terminal state.
    pub max_poll_attempts: u32,
    /// Streaming retry bound for transient transport failures.
    pub stream_retry_limit: u32,
    /// Delay before each streaming retry.
    pub stream_retry_delay: Duration,
    /// Base URL agents push to, e.g. `http://localhost:8000`. Webhook
    /// delivery is unavailable without it.
    pub webhook_base_url: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 60,
            stream_retry_limit: 2,
            stream_retry_delay: Duration::from_secs(1),
            webhook_base_url: None,
        }
    }
}

/// Event stream handed to delivery consumers. Failures arrive embedded as
/// [`AgentEvent::Error`] items rather than stream errors.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Chooses and drives a delivery strategy per message.
///
/// Owns the transport cache (keyed by agent URL + transport kind) and the
/// retry/poll cadence. Holds a handle to the webhook callback registry when
/// webhook delivery is available. Constructed per instance and shared by
/// reference — no process-wide state.
pub struct DeliveryCoordinator {
    config: DeliveryConfig,
    transports: Mutex<HashMap<(String, TransportKind), Arc<JsonRpcTransport>>>,
    webhooks: Option<Arc<CallbackRegistry>>,
}

impl DeliveryCoordinator {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            transports: Mutex::new(HashMap::new()),
            webhooks: None,
        }
    }

    /// Enable webhook delivery through the given callback registry.
    pub fn with_webhooks(mut self, registry: Arc<CallbackRegistry>) -> Self {
        self.webhooks = Some(registry);
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Resolve the delivery mode for an agent: an explicit override wins,
    /// then streaming capability, then push capability (when a webhook
    /// endpoint is available), then polling.
    pub fn resolve_mode(&self, agent: &Agent, requested: Option<DeliveryMode>) -> DeliveryMode {
        if let Some(mode) = requested {
            return mode;
        }
        if agent.capabilities.streaming {
            return DeliveryMode::Streaming;
        }
        if agent.capabilities.push_notifications
            && self.webhooks.is_some()
            && self.config.webhook_base_url.is_some()
        {
            return DeliveryMode::Webhook;
        }
        DeliveryMode::Polling
    }

    /// Get or build the cached transport for an agent.
    pub(crate) fn transport(&self, agent: &Agent) -> Result<Arc<JsonRpcTransport>, ClientError> {
        let key = (agent.url.clone(), agent.transport);
        let mut cache = self
            .transports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(transport) = cache.get(&key) {
            return Ok(transport.clone());
        }
        let transport = Arc::new(JsonRpcTransport::new(
            &agent.url,
            &agent.authentication.headers(),
        )?);
        cache.insert(key, transport.clone());
        Ok(transport)
    }

    /// Drop the cached transport so the next use builds a fresh client.
    fn evict_transport(&self, agent: &Agent) {
        self.transports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&(agent.url.clone(), agent.transport));
    }

    /// Issue `tasks/cancel` for a task on the given agent.
    pub async fn cancel_task(&self, agent: &Agent, task_id: &str) -> Result<Task, ClientError> {
        let transport = self.transport(agent)?;
        transport
            .cancel_task(TaskIdParams {
                id: task_id.to_string(),
            })
            .await
    }

    /// Fetch the current state of a task on the given agent.
    pub async fn get_task(&self, agent: &Agent, task_id: &str) -> Result<Task, ClientError> {
        let transport = self.transport(agent)?;
        transport
            .get_task(TaskIdParams {
                id: task_id.to_string(),
            })
            .await
    }

    /// Send a message and return the event stream for the chosen strategy.
    ///
    /// Exactly one delivery path drives the stream; dropping it stops
    /// consumption and releases any webhook registration it made.
    pub fn deliver(
        self: &Arc<Self>,
        agent: &Agent,
        message: Message,
        requested: Option<DeliveryMode>,
    ) -> DeliveryStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mode = self.resolve_mode(agent, requested);
        let coordinator = self.clone();
        let agent = agent.clone();

        tokio::spawn(async move {
            match mode {
                DeliveryMode::Streaming => coordinator.run_streaming(agent, message, tx).await,
                DeliveryMode::Polling => coordinator.run_polling(agent, message, tx).await,
                DeliveryMode::Webhook => coordinator.run_webhook(agent, message, tx).await,
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    /// Streaming path: one long-lived SSE subscription per message.
    ///
    /// Transient transport failures (503, connection-level) are retried up
    /// to the configured bound, with the cache entry evicted so a fresh
    /// client backs each attempt. Non-transient failures propagate as a
    /// final error event.
    async fn run_streaming(
        self: Arc<Self>,
        agent: Agent,
        message: Message,
        tx: mpsc::UnboundedSender<AgentEvent>,
    ) {
        let params = SendMessageParams::streaming(&message);
        let mut attempt: u32 = 0;

        loop {
            let transport = match self.transport(&agent) {
                Ok(t) => t,
                Err(e) => {
                    let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                    return;
                }
            };

            let failure = match transport.send_message_stream(params.clone()).await {
                Ok(mut stream) => loop {
                    match stream.next().await {
                        Some(Ok(event)) => {
                            if tx.send(event).is_err() {
                                return; // consumer gone
                            }
                        }
                        Some(Err(e)) => break Some(e),
                        None => break None,
                    }
                },
                Err(e) => Some(e),
            };

            match failure {
                None => return,
                Some(e) if e.is_transient() && attempt < self.config.stream_retry_limit => {
                    attempt += 1;
                    tracing::warn!(
                        agent = %agent.id,
                        attempt,
                        "transient stream failure, retrying: {e}"
                    );
                    self.evict_transport(&agent);
                    tokio::time::sleep(self.config.stream_retry_delay).await;
                }
                Some(e) => {
                    let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                    return;
                }
            }
        }
    }

    /// Polling path: blocking send, then `tasks/get` on a fixed cadence.
    ///
    /// Only the terminal task is forwarded after the initial response; a
    /// poll failure yields one error event and aborts. Exhausting the
    /// attempt limit ends the stream without an error.
    async fn run_polling(
        self: Arc<Self>,
        agent: Agent,
        message: Message,
        tx: mpsc::UnboundedSender<AgentEvent>,
    ) {
        let transport = match self.transport(&agent) {
            Ok(t) => t,
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                return;
            }
        };

        let params = SendMessageParams::blocking(&message, None);
        let event = match transport.send_message(params).await {
            Ok(event) => event,
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                return;
            }
        };

        let pending_task = match &event {
            AgentEvent::Task(task) if !task.status.state.is_terminal() => Some(task.id.clone()),
            _ => None,
        };
        if tx.send(event).is_err() {
            return;
        }
        let Some(task_id) = pending_task else {
            return;
        };

        for attempt in 0..self.config.max_poll_attempts {
            match transport
                .get_task(TaskIdParams {
                    id: task_id.clone(),
                })
                .await
            {
                Ok(task) => {
                    if task.status.state.is_terminal() {
                        let _ = tx.send(AgentEvent::Task(task));
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(%task_id, "poll failed: {e}");
                    let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                    return;
                }
            }
            if attempt + 1 < self.config.max_poll_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        tracing::warn!(%task_id, "polling attempts exhausted before terminal state");
    }

    /// Webhook-wait path: register the callback under a fresh correlation
    /// id *before* the blocking send, so a push that races the response
    /// still finds its registration. No local polling afterwards.
    async fn run_webhook(
        self: Arc<Self>,
        agent: Agent,
        message: Message,
        tx: mpsc::UnboundedSender<AgentEvent>,
    ) {
        let (registry, base_url) = match (&self.webhooks, &self.config.webhook_base_url) {
            (Some(registry), Some(base_url)) => (registry.clone(), base_url.clone()),
            _ => {
                let e = ClientError::WebhookUnavailable(
                    "no callback registry or base URL configured".into(),
                );
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                return;
            }
        };

        let transport = match self.transport(&agent) {
            Ok(t) => t,
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                return;
            }
        };

        let correlation_id = uuid::Uuid::new_v4().to_string();
        let token = uuid::Uuid::new_v4().to_string();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel();
        registry.register(&correlation_id, push_tx, Some(token.clone()));

        let push = PushNotificationConfig {
            url: format!(
                "{}/webhook/{correlation_id}",
                base_url.trim_end_matches('/')
            ),
            token: Some(token),
            authentication: None,
        };
        let params = SendMessageParams::blocking(&message, Some(push));

        match transport.send_message(params).await {
            Ok(event) => {
                let terminal = matches!(
                    &event,
                    AgentEvent::Task(task) if task.status.state.is_terminal()
                );
                if tx.send(event).is_err() || terminal {
                    registry.unregister(&correlation_id);
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_rpc_error()));
                registry.unregister(&correlation_id);
                return;
            }
        }

        loop {
            tokio::select! {
                pushed = push_rx.recv() => match pushed {
                    Some(task) => {
                        let terminal = task.status.state.is_terminal();
                        if tx.send(AgentEvent::Task(task)).is_err() || terminal {
                            break;
                        }
                    }
                    None => break, // registration cleared elsewhere
                },
                // Consumer dropped the stream: stop waiting and release the
                // registration instead of leaking it.
                _ = tx.closed() => break,
            }
        }
        registry.unregister(&correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcomm_types::AgentCapabilities;

    fn agent_with(streaming: bool, push: bool) -> Agent {
        Agent::new("a-1", "http://localhost:1").with_capabilities(AgentCapabilities {
            streaming,
            push_notifications: push,
        })
    }

    #[test]
    fn test_resolve_mode_override_wins() {
        let coordinator = DeliveryCoordinator::new(DeliveryConfig::default());
        let agent = agent_with(true, true);
        assert_eq!(
            coordinator.resolve_mode(&agent, Some(DeliveryMode::Polling)),
            DeliveryMode::Polling
        );
    }

    #[test]
    fn test_resolve_mode_prefers_streaming() {
        let coordinator = DeliveryCoordinator::new(DeliveryConfig {
            webhook_base_url: Some("http://localhost:8000".into()),
            ..Default::default()
        })
        .with_webhooks(Arc::new(CallbackRegistry::new()));
        assert_eq!(
            coordinator.resolve_mode(&agent_with(true, true), None),
            DeliveryMode::Streaming
        );
    }

    #[test]
    fn test_resolve_mode_webhook_needs_registry_and_url() {
        // Push capability alone is not enough.
        let coordinator = DeliveryCoordinator::new(DeliveryConfig::default());
        assert_eq!(
            coordinator.resolve_mode(&agent_with(false, true), None),
            DeliveryMode::Polling
        );

        let coordinator = DeliveryCoordinator::new(DeliveryConfig {
            webhook_base_url: Some("http://localhost:8000".into()),
            ..Default::default()
        })
        .with_webhooks(Arc::new(CallbackRegistry::new()));
        assert_eq!(
            coordinator.resolve_mode(&agent_with(false, true), None),
            DeliveryMode::Webhook
        );
    }

    #[test]
    fn test_resolve_mode_falls_back_to_polling() {
        let coordinator = DeliveryCoordinator::new(DeliveryConfig::default());
        assert_eq!(
            coordinator.resolve_mode(&agent_with(false, false), None),
            DeliveryMode::Polling
        );
    }

    #[test]
    fn test_transport_cache_reuse_and_eviction() {
        let coordinator = DeliveryCoordinator::new(DeliveryConfig::default());
        let agent = agent_with(false, false);

        let first = coordinator.transport(&agent).unwrap();
        let second = coordinator.transport(&agent).unwrap();
        assert!(Arc::ptr_eq(&first, &second), "cache should reuse clients");

        coordinator.evict_transport(&agent);
        let third = coordinator.transport(&agent).unwrap();
        assert!(
            !Arc::ptr_eq(&first, &third),
            "eviction should rebuild the client"
        );
    }

    #[tokio::test]
    async fn test_webhook_mode_without_registry_yields_error_event() {
        let coordinator = Arc::new(DeliveryCoordinator::new(DeliveryConfig::default()));
        let agent = agent_with(false, true);
        let mut stream = coordinator.deliver(
            &agent,
            Message::user("hi"),
            Some(DeliveryMode::Webhook),
        );
        match stream.next().await {
            Some(AgentEvent::Error(e)) => assert!(e.message.contains("Webhook")),
            other => panic!("Expected error event, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }
}
