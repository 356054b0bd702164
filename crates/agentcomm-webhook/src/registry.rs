use std::collections::HashMap;
use std::sync::Mutex;

use agentcomm_types::Task;
use tokio::sync::mpsc;

/// Subscription channel for pushed task updates.
///
/// Callbacks are channels rather than callables: a subscriber registers the
/// send half and consumes updates at its own pace; dropping the receive
/// half is how a subscriber unregisters itself (closed senders are pruned
/// during dispatch).
pub type TaskSender = mpsc::UnboundedSender<Task>;

#[derive(Default)]
struct Inner {
    callbacks: HashMap<String, Vec<TaskSender>>,
    tokens: HashMap<String, String>,
    threads: HashMap<String, String>,
}

/// Correlation state for inbound push notifications.
///
/// Owned by whoever constructs it and shared by reference — tests build
/// isolated instances. A registration lives until explicit
/// [`unregister`](CallbackRegistry::unregister) or until every subscriber
/// has dropped its receiver.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: Mutex<Inner>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a subscriber for `task_id`, optionally with a shared secret
    /// the webhook listener will require from the agent.
    pub fn register(&self, task_id: &str, sender: TaskSender, token: Option<String>) {
        let mut inner = self.lock();
        inner
            .callbacks
            .entry(task_id.to_string())
            .or_default()
            .push(sender);
        if let Some(token) = token {
            inner.tokens.insert(task_id.to_string(), token);
        }
        tracing::debug!(task_id, "registered webhook callback");
    }

    /// Remove every subscriber for `task_id`, along with its token and
    /// thread mapping.
    pub fn unregister(&self, task_id: &str) {
        let mut inner = self.lock();
        inner.callbacks.remove(task_id);
        inner.tokens.remove(task_id);
        inner.threads.remove(task_id);
        tracing::debug!(task_id, "unregistered webhook callbacks");
    }

    /// Associate an opaque thread/conversation identifier with `task_id`,
    /// for callers that route pushes back to a specific UI context. Shares
    /// the registration's lifetime.
    pub fn register_thread(&self, task_id: &str, thread_id: &str) {
        self.lock()
            .threads
            .insert(task_id.to_string(), thread_id.to_string());
    }

    pub fn thread_id(&self, task_id: &str) -> Option<String> {
        self.lock().threads.get(task_id).cloned()
    }

    /// The secret token required for `task_id`, if one was registered.
    pub fn token(&self, task_id: &str) -> Option<String> {
        self.lock().tokens.get(task_id).cloned()
    }

    pub fn has_callbacks(&self, task_id: &str) -> bool {
        self.lock()
            .callbacks
            .get(task_id)
            .is_some_and(|list| !list.is_empty())
    }

    /// Deliver a pushed task to every subscriber for `task_id`, in
    /// registration order.
    ///
    /// A closed subscriber is logged and skipped — it never blocks the
    /// others — and pruned afterwards. Returns the number of successful
    /// deliveries.
    pub fn dispatch(&self, task_id: &str, task: &Task) -> usize {
        let mut inner = self.lock();
        let Some(senders) = inner.callbacks.get_mut(task_id) else {
            tracing::debug!(task_id, "push notification with no registered callbacks");
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|sender| match sender.send(task.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                tracing::error!(task_id, "dropping closed webhook subscriber: {e}");
                false
            }
        });

        if senders.is_empty() {
            inner.callbacks.remove(task_id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcomm_types::{TaskState, TaskStatus};

    fn make_task(id: &str, state: TaskState) -> Task {
        Task {
            id: id.into(),
            context_id: None,
            status: TaskStatus::new(state),
            artifacts: vec![],
        }
    }

    #[tokio::test]
    async fn test_register_and_dispatch_in_order() {
        let registry = CallbackRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("t-1", tx1, None);
        registry.register("t-1", tx2, None);

        let delivered = registry.dispatch("t-1", &make_task("t-1", TaskState::Working));
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap().id, "t-1");
        assert_eq!(rx2.recv().await.unwrap().id, "t-1");
    }

    #[tokio::test]
    async fn test_closed_subscriber_never_blocks_siblings() {
        let registry = CallbackRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("t-1", tx1, None);
        registry.register("t-1", tx2, None);
        drop(rx1);

        let delivered = registry.dispatch("t-1", &make_task("t-1", TaskState::Completed));
        assert_eq!(delivered, 1);
        assert_eq!(rx2.recv().await.unwrap().id, "t-1");

        // The closed subscriber was pruned; the live one remains.
        assert!(registry.has_callbacks("t-1"));
    }

    #[test]
    fn test_dispatch_unknown_task_is_noop() {
        let registry = CallbackRegistry::new();
        assert_eq!(
            registry.dispatch("ghost", &make_task("ghost", TaskState::Working)),
            0
        );
    }

    #[test]
    fn test_unregister_clears_token_and_thread() {
        let registry = CallbackRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("t-1", tx, Some("secret".into()));
        registry.register_thread("t-1", "thread-9");

        assert_eq!(registry.token("t-1").as_deref(), Some("secret"));
        assert_eq!(registry.thread_id("t-1").as_deref(), Some("thread-9"));

        registry.unregister("t-1");
        assert!(registry.token("t-1").is_none());
        assert!(registry.thread_id("t-1").is_none());
        assert!(!registry.has_callbacks("t-1"));
    }

    #[test]
    fn test_all_closed_subscribers_removes_entry() {
        let registry = CallbackRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("t-1", tx, None);
        drop(rx);

        registry.dispatch("t-1", &make_task("t-1", TaskState::Working));
        assert!(!registry.has_callbacks("t-1"));
    }
}
