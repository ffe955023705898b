//! In-memory persistence
//!
//! Process-local stores backing the audit trail and the conversation
//! history. A relational store can implement the same traits; these
//! implementations are what the demos and tests run against, and they honor
//! the same ordering contracts.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::services::{EventRecord, EventStore, MessageStore, Role, StoredMessage};

/// Append-only in-memory audit store
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All persisted records in insertion order
    pub async fn records(&self) -> Vec<EventRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn persist_event(&self, record: EventRecord) -> Result<()> {
        tracing::debug!(
            event_type = %record.event_type,
            event_id = %record.event_id,
            "Event persisted"
        );
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// In-memory conversation store
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing message (test and demo setup)
    pub async fn push(&self, role: Role, content: impl Into<String>) {
        self.messages.lock().await.push(StoredMessage {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn history(&self) -> Result<Vec<StoredMessage>> {
        Ok(self.messages.lock().await.clone())
    }

    async fn append_exchange(&self, user: StoredMessage, assistant: StoredMessage) -> Result<()> {
        // Single lock scope keeps the pair adjacent and ordered
        let mut messages = self.messages.lock().await;
        messages.push(user);
        messages.push(assistant);
        Ok(())
    }
}
