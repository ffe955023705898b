//! Audit persistence handler
//!
//! Consumes the audit topic and writes each envelope to the event store.
//! This is the only consumer of `event.save` the crate ships; every publish
//! in the process ends up here via the broker's audit mirror.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::Envelope;
use crate::error::Result;
use crate::handler::EventHandler;
use crate::services::{EventRecord, EventStore};

/// `event.save` → event store
pub struct SaveEventHandler {
    store: Arc<dyn EventStore>,
}

impl SaveEventHandler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for SaveEventHandler {
    fn name(&self) -> &str {
        "save_event"
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let record = EventRecord::new(
            envelope.event_type,
            envelope.timestamp,
            envelope.payload,
            envelope.metadata,
        );
        self.store.persist_event(record).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bus::topics;
    use crate::services::MemoryEventStore;

    #[tokio::test]
    async fn test_envelope_persisted_as_record() {
        let store = Arc::new(MemoryEventStore::new());
        let handler = SaveEventHandler::new(store.clone());

        let audit = Envelope::new(topics::VIDEO_FRAME, json!({"data": "abc"}))
            .audit_copy(topics::VIDEO_FRAME);
        handler.handle(audit.clone()).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "video.frame");
        assert_eq!(records[0].timestamp, audit.timestamp);
        assert_eq!(records[0].data, audit.payload);
    }
}
