//! Topic-addressed publish/subscribe broker
//!
//! The bus routes envelopes between publishers and per-topic handler lists.
//! One listener task runs per active topic; handler dispatch for a topic is
//! sequential on that task, so handlers on the same topic are mutually
//! ordered while handlers on different topics run fully in parallel. Every
//! publish is additionally mirrored to the audit topic (`event.save`).
//!
//! Delivery is at-most-once and best-effort: no durability, no replay, no
//! cross-process distribution.

pub mod broker;
pub mod config;
pub mod envelope;
pub mod registry;
pub mod stats;

pub use broker::{shared, EventBus};
pub use config::BusConfig;
pub use envelope::{topics, Envelope};
pub use registry::SubscriberRegistry;
pub use stats::{BusStats, StatsSnapshot};
