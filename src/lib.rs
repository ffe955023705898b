//! In-process pub/sub event bus for virtual-human interaction pipelines
//!
//! `vhbus` routes asynchronous domain events (video frames, audio chunks,
//! transcriptions, generated responses) between an ingress gateway, a set of
//! processing handlers and a persistence sink.
//!
//! - [`bus`] — the broker: topic-addressed publish/subscribe with one
//!   listener task per active topic and an automatic audit mirror of every
//!   publish onto `event.save`.
//! - [`handler`] — the [`EventHandler`] capability implemented by every
//!   subscriber.
//! - [`pipeline`] — the canonical handlers (emotion analysis, face
//!   recognition, transcription, response generation, audit persistence) and
//!   their wiring.
//! - [`services`] — contracts for the external collaborators the handlers
//!   call, plus in-memory persistence.
//! - [`gateway`] — the bridge between external bidirectional connections and
//!   the bus.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use vhbus::bus::{topics, BusConfig, Envelope, EventBus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = Arc::new(EventBus::with_config(BusConfig::default()));
//!     bus.start_listener(topics::EVENT_TEXT).await;
//!
//!     let envelope = Envelope::new(topics::EVENT_TEXT, json!({"data": "hello"}));
//!     bus.publish(topics::EVENT_TEXT, envelope).await;
//!
//!     bus.shutdown().await;
//! }
//! ```
//!
//! Delivery is at-most-once and best-effort by design: there is no
//! durability, no replay and no cross-process distribution.

pub mod bus;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod pipeline;
pub mod services;

pub use bus::{topics, BusConfig, Envelope, EventBus};
pub use error::{Error, Result};
pub use gateway::{GatewayConfig, GatewayServer};
pub use handler::{EventHandler, HandlerRef};
