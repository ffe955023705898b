//! Event bus implementation
//!
//! The bus owns the per-topic transport channels, the subscriber registry and
//! every listener task. Publish is best-effort and fire-and-forget: transport
//! faults are logged and swallowed, and every publish is mirrored to the
//! audit topic.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<EventBus>
//!                  ┌────────────────────────────────┐
//!                  │ channels: topic -> broadcast   │
//!                  │ registry: topic -> [handlers]  │
//!                  │ listeners: topic -> JoinHandle │
//!                  └───────────────┬────────────────┘
//!                                  │
//!          ┌───────────────────────┼──────────────────────┐
//!          ▼                       ▼                      ▼
//!     [publish()]          [listener task T1]      [listener task T2]
//!     send Bytes            rx.recv() ──► snapshot handlers ──► handle()
//!          │
//!          └──► audit mirror to "event.save"
//! ```
//!
//! Serialized envelopes travel as `bytes::Bytes`, so fan-out to several
//! listeners shares one allocation via reference counting.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::handler::HandlerRef;

use super::config::BusConfig;
use super::envelope::Envelope;
use super::registry::SubscriberRegistry;
use super::stats::{BusStats, StatsSnapshot};

/// Topic-addressed publish/subscribe broker
///
/// Construct one instance and pass it explicitly (usually as `Arc<EventBus>`)
/// to every component that publishes or subscribes; there is no process-wide
/// singleton.
pub struct EventBus {
    config: BusConfig,
    registry: SubscriberRegistry,
    channels: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,
    listeners: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    stats: BusStats,
}

impl EventBus {
    /// Create a bus with default configuration
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with custom configuration
    pub fn with_config(config: BusConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            registry: SubscriberRegistry::new(),
            channels: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            shutdown_tx,
            stats: BusStats::new(),
        }
    }

    /// Get the bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Publish an envelope on a topic
    ///
    /// Best-effort, fire-and-forget: the envelope is handed to the topic's
    /// transport channel, then a copy with `type` forced to the topic name
    /// and the original envelope as payload is sent to the audit topic. This
    /// call never blocks on subscribers and never surfaces transport faults
    /// to the caller; failures are logged here.
    pub async fn publish(&self, topic: &str, envelope: Envelope) {
        BusStats::incr(&self.stats.published);

        match envelope.to_bytes() {
            Ok(raw) => self.send_raw(topic, raw).await,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to publish event");
                return;
            }
        }

        // Audit mirror. Sent through the raw transport, not publish(), so a
        // direct publish on the audit topic does not recurse.
        let audit = envelope.audit_copy(topic);
        match audit.to_bytes() {
            Ok(raw) => {
                self.send_raw(&self.config.audit_topic, raw).await;
                BusStats::incr(&self.stats.audited);
            }
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to publish audit mirror");
            }
        }
    }

    /// Register a handler to receive every envelope dispatched on a topic
    ///
    /// Handlers are invoked in registration order; registering the same
    /// handler twice means two invocations per envelope.
    pub async fn subscribe(&self, topic: &str, handler: HandlerRef) {
        self.registry.subscribe(topic, handler).await;
    }

    /// Remove one registration of a handler from a topic
    ///
    /// After this returns, no subsequent publish on the topic invokes the
    /// handler. Unsubscribing an unknown handler is a no-op.
    pub async fn unsubscribe(&self, topic: &str, handler: &HandlerRef) {
        self.registry.unsubscribe(topic, handler).await;
    }

    /// Number of handlers currently registered for a topic
    pub async fn handler_count(&self, topic: &str) -> usize {
        self.registry.handler_count(topic).await
    }

    /// Topics that currently have at least one registered handler
    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.registry.topics().await
    }

    /// Snapshot of the bus counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Ensure a listener task exists and is running for a topic
    ///
    /// Idempotent: calling this again for the same topic never creates a
    /// duplicate delivery path.
    pub async fn start_listener(self: &Arc<Self>, topic: &str) {
        let mut listeners = self.listeners.lock().await;

        if let Some(existing) = listeners.get(topic) {
            if !existing.is_finished() {
                return;
            }
            listeners.remove(topic);
        }

        let rx = self.sender_for(topic).await.subscribe();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let bus = Arc::clone(self);
        let topic_name = topic.to_string();

        let handle = tokio::spawn(async move {
            bus.listen(topic_name, rx, shutdown_rx).await;
        });

        listeners.insert(topic.to_string(), handle);
        tracing::info!(topic = %topic, "Listener started");
    }

    /// Stop all listeners and wait for them to finish
    ///
    /// A dispatch already in progress completes; nothing new is consumed
    /// afterwards. Messages still queued on a topic channel are lost, per
    /// the at-most-once contract.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut listeners = self.listeners.lock().await;
            listeners.drain().collect()
        };

        for (topic, handle) in handles {
            if let Err(e) = handle.await {
                tracing::warn!(topic = %topic, error = %e, "Listener task aborted");
            }
        }

        tracing::info!("Event bus shut down");
    }

    /// Get or create the transport channel for a topic
    async fn sender_for(&self, topic: &str) -> broadcast::Sender<Bytes> {
        {
            let channels = self.channels.read().await;
            if let Some(tx) = channels.get(topic) {
                return tx.clone();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.config.channel_capacity).0)
            .clone()
    }

    /// Hand serialized bytes to a topic's transport channel
    async fn send_raw(&self, topic: &str, raw: Bytes) {
        let tx = self.sender_for(topic).await;

        // send() errors only when there are no receivers; with no listener
        // running the message is simply lost, which is the at-most-once
        // contract.
        if tx.send(raw).is_err() {
            BusStats::incr(&self.stats.dropped);
            tracing::trace!(topic = %topic, "No listener for topic, message dropped");
        }
    }

    /// Blocking receive loop for one topic
    async fn listen(
        &self,
        topic: String,
        mut rx: broadcast::Receiver<Bytes>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!(topic = %topic, "Listener stopping");
                        break;
                    }
                }
                received = rx.recv() => match received {
                    Ok(raw) => self.dispatch(&topic, &raw).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        BusStats::incr(&self.stats.dropped);
                        tracing::warn!(
                            topic = %topic,
                            skipped = skipped,
                            "Listener lagged, messages lost"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!(topic = %topic, "Topic channel closed");
                        break;
                    }
                },
            }
        }
    }

    /// Dispatch one raw transport message to the topic's handlers
    ///
    /// The handler list is snapshotted with no lock held during invocation;
    /// handlers run sequentially in registration order and a failure never
    /// stops the siblings after it.
    async fn dispatch(&self, topic: &str, raw: &[u8]) {
        let envelope = match Envelope::from_bytes(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                BusStats::incr(&self.stats.decode_failures);
                tracing::error!(topic = %topic, error = %e, "Failed to decode message, dropping");
                return;
            }
        };

        let handlers = self.registry.snapshot(topic).await;

        for handler in handlers {
            match handler.handle(envelope.clone()).await {
                Ok(()) => BusStats::incr(&self.stats.dispatched),
                Err(e) => {
                    BusStats::incr(&self.stats.handler_failures);
                    tracing::error!(
                        topic = %topic,
                        handler = handler.name(),
                        error = %e,
                        "Handler failed"
                    );
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper for the common construction pattern
pub fn shared(config: BusConfig) -> Arc<EventBus> {
    Arc::new(EventBus::with_config(config))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::bus::topics;
    use crate::handler::testing::{FailingHandler, RecordingHandler};

    /// Let spawned listener tasks drain their channels
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_publish_reaches_all_handlers_in_order() {
        let bus = shared(BusConfig::default());
        let first = RecordingHandler::new("first");
        let second = RecordingHandler::new("second");

        bus.subscribe(topics::EVENT_TEXT, first.clone()).await;
        bus.subscribe(topics::EVENT_TEXT, second.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        let envelope = Envelope::new(topics::EVENT_TEXT, json!({"data": "hello"}));
        bus.publish(topics::EVENT_TEXT, envelope.clone()).await;
        settle().await;

        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);
        assert_eq!(first.received.lock().unwrap()[0], envelope);
        assert_eq!(second.received.lock().unwrap()[0], envelope);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_audit_mirror_published_once() {
        let bus = shared(BusConfig::default());
        let audit = RecordingHandler::new("audit");

        bus.subscribe(topics::EVENT_SAVE, audit.clone()).await;
        bus.start_listener(topics::EVENT_SAVE).await;
        bus.start_listener(topics::VIDEO_FRAME).await;

        let envelope = Envelope::new(topics::VIDEO_FRAME, json!({"data": "abc"}));
        bus.publish(topics::VIDEO_FRAME, envelope.clone()).await;
        settle().await;

        let records = audit.received.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "video.frame");

        let inner: Envelope = serde_json::from_value(records[0].payload.clone()).unwrap();
        assert_eq!(inner, envelope);
        drop(records);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_siblings() {
        let bus = shared(BusConfig::default());
        let failing: HandlerRef = Arc::new(FailingHandler);
        let after = RecordingHandler::new("after");

        bus.subscribe(topics::EVENT_TEXT, failing).await;
        bus.subscribe(topics::EVENT_TEXT, after.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({"data": "x"})),
        )
        .await;
        settle().await;

        assert_eq!(after.count(), 1);
        assert_eq!(bus.stats().handler_failures, 1);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = shared(BusConfig::default());
        let handler = RecordingHandler::new("gone");

        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({"n": 1})),
        )
        .await;
        settle().await;
        assert_eq!(handler.count(), 1);

        let handler_ref: HandlerRef = handler.clone();
        bus.unsubscribe(topics::EVENT_TEXT, &handler_ref).await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({"n": 2})),
        )
        .await;
        settle().await;
        assert_eq!(handler.count(), 1);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_listener_is_idempotent() {
        let bus = shared(BusConfig::default());
        let handler = RecordingHandler::new("once");

        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;
        bus.start_listener(topics::EVENT_TEXT).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({"data": "x"})),
        )
        .await;
        settle().await;

        assert_eq!(handler.count(), 1);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_subscription_invoked_twice() {
        let bus = shared(BusConfig::default());
        let handler = RecordingHandler::new("twice");

        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({"data": "x"})),
        )
        .await;
        settle().await;

        assert_eq!(handler.count(), 2);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_without_listener_is_silent() {
        let bus = shared(BusConfig::default());

        bus.publish(
            "nobody.listening",
            Envelope::new("nobody.listening", json!({})),
        )
        .await;

        let stats = bus.stats();
        assert_eq!(stats.published, 1);
        // Primary send and audit mirror both found no receiver
        assert_eq!(stats.dropped, 2);
    }

    #[tokio::test]
    async fn test_malformed_message_dropped() {
        let bus = shared(BusConfig::default());
        let handler = RecordingHandler::new("clean");

        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        // Inject garbage directly on the transport
        bus.send_raw(topics::EVENT_TEXT, Bytes::from_static(b"not json"))
            .await;
        settle().await;

        assert_eq!(handler.count(), 0);
        assert_eq!(bus.stats().decode_failures, 1);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_can_reenter_bus() {
        // A handler that publishes while being dispatched must not deadlock.
        struct Chainer {
            bus: Arc<EventBus>,
        }

        #[async_trait::async_trait]
        impl crate::handler::EventHandler for Chainer {
            fn name(&self) -> &str {
                "chainer"
            }

            async fn handle(&self, _envelope: Envelope) -> crate::error::Result<()> {
                self.bus
                    .publish(topics::EVENT_TEXT, Envelope::new(topics::EVENT_TEXT, json!({})))
                    .await;
                Ok(())
            }
        }

        let bus = shared(BusConfig::default());
        let sink = RecordingHandler::new("sink");

        bus.subscribe(topics::EVENT_IMAGE, Arc::new(Chainer { bus: bus.clone() }))
            .await;
        bus.subscribe(topics::EVENT_TEXT, sink.clone()).await;
        bus.start_listener(topics::EVENT_IMAGE).await;
        bus.start_listener(topics::EVENT_TEXT).await;

        bus.publish(
            topics::EVENT_IMAGE,
            Envelope::new(topics::EVENT_IMAGE, json!({})),
        )
        .await;
        settle().await;

        assert_eq!(sink.count(), 1);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_consumption() {
        let bus = shared(BusConfig::default());
        let handler = RecordingHandler::new("stopped");

        bus.subscribe(topics::EVENT_TEXT, handler.clone()).await;
        bus.start_listener(topics::EVENT_TEXT).await;
        bus.shutdown().await;

        bus.publish(
            topics::EVENT_TEXT,
            Envelope::new(topics::EVENT_TEXT, json!({})),
        )
        .await;
        settle().await;

        assert_eq!(handler.count(), 0);
    }
}
