//! Bus configuration

/// Configuration options for the event bus
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Capacity of each per-topic broadcast channel
    ///
    /// A listener that falls this many messages behind starts losing the
    /// oldest ones; delivery is at-most-once by design.
    pub channel_capacity: usize,

    /// Topic that receives the audit mirror of every publish
    pub audit_topic: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            audit_topic: super::topics::EVENT_SAVE.to_string(),
        }
    }
}

impl BusConfig {
    /// Set the per-topic channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the audit topic name
    pub fn audit_topic(mut self, topic: impl Into<String>) -> Self {
        self.audit_topic = topic.into();
        self
    }
}
