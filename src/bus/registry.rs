//! Subscriber registry
//!
//! Thread-safe mapping from topic name to the ordered list of registered
//! handlers. The write lock is held only for the duration of a list edit;
//! dispatch reads clone the current list and release the lock before any
//! handler runs, so a handler may re-enter subscribe/unsubscribe/publish
//! without deadlocking or corrupting the list being iterated.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::handler::{same_handler, HandlerRef};

/// Topic → ordered handler list
///
/// Handlers are referenced, never owned: whoever registered a handler
/// (startup wiring or a live gateway connection) keeps its own `Arc`.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<String, Vec<HandlerRef>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for a topic
    ///
    /// Handlers are invoked in registration order. Registering the same
    /// handler twice results in it being invoked twice per envelope; there is
    /// no deduplication.
    pub async fn subscribe(&self, topic: &str, handler: HandlerRef) {
        let mut subscribers = self.subscribers.write().await;
        let list = subscribers.entry(topic.to_string()).or_default();
        list.push(handler);

        tracing::debug!(
            topic = %topic,
            handlers = list.len(),
            "Handler subscribed"
        );
    }

    /// Remove one matching registration of a handler from a topic
    ///
    /// If the handler was registered more than once only the first entry is
    /// removed. Unsubscribing a handler that is not registered is a no-op.
    pub async fn unsubscribe(&self, topic: &str, handler: &HandlerRef) {
        let mut subscribers = self.subscribers.write().await;

        if let Some(list) = subscribers.get_mut(topic) {
            if let Some(index) = list.iter().position(|h| same_handler(h, handler)) {
                list.remove(index);
                tracing::debug!(
                    topic = %topic,
                    handlers = list.len(),
                    "Handler unsubscribed"
                );
            }
            if list.is_empty() {
                subscribers.remove(topic);
            }
        }
    }

    /// Snapshot the current handler list for a topic
    ///
    /// The clone is taken under the read lock and the lock is released before
    /// this returns; callers iterate the snapshot with no lock held.
    pub async fn snapshot(&self, topic: &str) -> Vec<HandlerRef> {
        let subscribers = self.subscribers.read().await;
        subscribers.get(topic).cloned().unwrap_or_default()
    }

    /// Number of handlers currently registered for a topic
    pub async fn handler_count(&self, topic: &str) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Topics that currently have at least one handler
    pub async fn topics(&self) -> Vec<String> {
        let subscribers = self.subscribers.read().await;
        subscribers.keys().cloned().collect()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
