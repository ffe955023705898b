//! External collaborator contracts
//!
//! The emotion, face, transcription and language-generation services are
//! opaque transforms from the broker's point of view; the bus and the
//! pipeline only know these traits. Persistence is split into the audit
//! store ([`EventStore`]) and the conversation store ([`MessageStore`]).

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

pub use memory::{MemoryEventStore, MemoryMessageStore};

/// A face embedding as produced by the recognition service
pub type FaceDescriptor = Vec<f64>;

/// Speaker role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of conversation context passed to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Audit record persisted for every envelope on the audit topic
///
/// Mirrors the relational `events` table: id, type, timestamp, free-form
/// data and optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: String,
    pub data: Value,
    pub metadata: Option<Value>,
}

impl EventRecord {
    /// Build a record from envelope fields with a fresh id
    pub fn new(
        event_type: impl Into<String>,
        timestamp: impl Into<String>,
        data: Value,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            timestamp: timestamp.into(),
            data,
            metadata,
        }
    }
}

/// Stored conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// Emotion detection over a decoded image frame
///
/// Returns a mapping of emotion label to intensity; an empty mapping means
/// no face was found.
#[async_trait]
pub trait EmotionDetector: Send + Sync {
    async fn detect_emotions(&self, frame: &[u8]) -> Result<HashMap<String, f64>>;
}

/// Face detection and recognition over a decoded image frame
///
/// Returns the recognized and unrecognized face descriptors found in the
/// frame, in that order.
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    async fn detect_and_recognize_faces(
        &self,
        frame: &[u8],
    ) -> Result<(Vec<FaceDescriptor>, Vec<FaceDescriptor>)>;
}

/// Speech-to-text transcription
///
/// `None` means the clip contained no recognizable speech (silence); that is
/// not an error.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        sample_rate: u32,
        sample_width: u16,
    ) -> Result<Option<String>>;
}

/// Language generation over an ordered conversation context
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, context: &[ChatTurn]) -> Result<String>;
}

/// Persistence sink for audit records
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn persist_event(&self, record: EventRecord) -> Result<()>;
}

/// Persistence for conversation messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All stored messages in creation order (oldest first)
    async fn history(&self) -> Result<Vec<StoredMessage>>;

    /// Persist a user turn and the assistant's reply as one logical unit
    ///
    /// The user message must precede the assistant message in any listing by
    /// time.
    async fn append_exchange(&self, user: StoredMessage, assistant: StoredMessage) -> Result<()>;
}
