//! Per-connection gateway adapter
//!
//! Bridges one external bidirectional connection to the bus: inbound client
//! messages become publishes, and a connection-bound delivery handler pushes
//! envelopes from the configured outbound topics back to the client. The
//! wire format is newline-delimited JSON.
//!
//! The delivery handler only hands each envelope to the connection's own
//! unbounded send queue, so a slow client never stalls the shared topic
//! listener for other subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::{Error, Result};
use crate::handler::{EventHandler, HandlerRef};

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, delivery subscriptions not yet registered
    Connecting,
    /// Subscribed and serving traffic
    Open,
    /// Torn down; the delivery handler is unsubscribed everywhere
    Closed,
}

/// Forwards envelopes from a subscribed topic into the connection's send
/// queue
struct DeliveryHandler {
    name: String,
    outbound: mpsc::UnboundedSender<Bytes>,
}

#[async_trait]
impl EventHandler for DeliveryHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let raw = envelope.to_bytes()?;
        self.outbound
            .send(raw)
            .map_err(|_| Error::ChannelClosed(envelope.event_type))
    }
}

/// One gateway connection
///
/// Generic over the transport stream so tests can drive it with an in-memory
/// duplex pipe.
pub struct Connection<S> {
    session_id: u64,
    stream: S,
    bus: Arc<EventBus>,
    delivery_topics: Vec<String>,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a connection in the `Connecting` state
    pub fn new(
        session_id: u64,
        stream: S,
        bus: Arc<EventBus>,
        delivery_topics: Vec<String>,
    ) -> Self {
        Self {
            session_id,
            stream,
            bus,
            delivery_topics,
            state: ConnectionState::Connecting,
        }
    }

    /// Serve the connection until the client disconnects or the transport
    /// fails
    ///
    /// The delivery handler is unsubscribed from every topic it was
    /// registered on exactly once, on every exit path; a transport error
    /// triggers the same teardown as a graceful close.
    pub async fn run(mut self) -> Result<()> {
        let (read_half, mut write_half) = tokio::io::split(self.stream);
        let mut lines = BufReader::new(read_half).lines();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let delivery: HandlerRef = Arc::new(DeliveryHandler {
            name: format!("gateway_delivery_{}", self.session_id),
            outbound: outbound_tx,
        });

        for topic in &self.delivery_topics {
            self.bus.subscribe(topic, delivery.clone()).await;
            self.bus.start_listener(topic).await;
        }
        self.state = ConnectionState::Open;
        tracing::debug!(session_id = self.session_id, "Connection open");

        let result: Result<()> = async {
            let confirmation =
                serde_json::json!({"type": "connection_established", "message": "success"});
            write_half
                .write_all(confirmation.to_string().as_bytes())
                .await?;
            write_half.write_all(b"\n").await?;
            write_half.flush().await?;

            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            Self::on_message(self.session_id, &self.bus, &line).await;
                        }
                        Ok(None) => break Ok(()), // client closed the connection
                        Err(e) => break Err(Error::Io(e)),
                    },
                    outbound = outbound_rx.recv() => match outbound {
                        Some(raw) => {
                            write_half.write_all(&raw).await?;
                            write_half.write_all(b"\n").await?;
                            write_half.flush().await?;
                        }
                        // The delivery handler still holds the sender, so
                        // this only happens once it has been dropped.
                        None => break Ok(()),
                    },
                }
            }
        }
        .await;

        for topic in &self.delivery_topics {
            self.bus.unsubscribe(topic, &delivery).await;
        }
        self.state = ConnectionState::Closed;
        tracing::debug!(session_id = self.session_id, "Connection closed");

        result
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Translate one inbound client message into a publish
    ///
    /// Messages without a `type` are dropped without a publish; the client
    /// is not notified. Parse failures are likewise dropped and logged.
    async fn on_message(session_id: u64, bus: &Arc<EventBus>, line: &str) {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Dropping unparseable client message"
                );
                return;
            }
        };

        let client_type = match message.get("type").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::debug!(
                    session_id = session_id,
                    "Dropping client message without 'type'"
                );
                return;
            }
        };

        let topic = client_topic(client_type);
        let payload = message.get("payload").cloned().unwrap_or(Value::Null);
        let metadata = message
            .get("metadata")
            .filter(|m| !m.is_null())
            .cloned();

        // Fresh timestamp stamped at the point of publish
        let envelope = Envelope {
            event_type: topic.to_string(),
            payload,
            timestamp: Utc::now().to_rfc3339(),
            metadata,
        };

        tracing::trace!(
            session_id = session_id,
            topic = %topic,
            "Client message published"
        );
        bus.publish(&topic, envelope).await;
    }
}

/// Map a client message type onto its bus topic
///
/// Unknown types are used verbatim as topic names.
fn client_topic(client_type: &str) -> String {
    match client_type {
        "image" => topics::EVENT_IMAGE.to_string(),
        "text" => topics::EVENT_TEXT.to_string(),
        "audio" => topics::AUDIO_RAW.to_string(),
        other => other.to_string(),
    }
}
