//! Envelope and topic types for event routing
//!
//! This module defines the message unit carried on every topic and the
//! catalog of well-known topic names.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Well-known topic names
///
/// Topics need no declaration; both publish and subscribe create them
/// implicitly on first use. These constants exist so the pipeline and the
/// gateway agree on spelling.
pub mod topics {
    /// Inbound camera frames (base64 JPEG in `payload.data`)
    pub const VIDEO_FRAME: &str = "video.frame";
    /// Legacy name for inbound image frames
    pub const EVENT_IMAGE: &str = "event.image";
    /// Inbound raw audio chunks
    pub const AUDIO_RAW: &str = "audio.raw";
    /// Transcribed speech
    pub const AUDIO_TRANSCRIPTION: &str = "audio.transcription";
    /// Inbound text from a client
    pub const EVENT_TEXT: &str = "event.text";
    /// Emotion analysis results
    pub const EMOTION_ANALYSIS: &str = "emotion.analysis";
    /// Face recognition results
    pub const FACE_RECOGNITION_DETECT: &str = "face_recognition.detect";
    /// Generated assistant responses
    pub const ASSISTANT_RESPONSE: &str = "assistant.response";
    /// Legacy name for generated responses
    pub const RESPONSE_TEXT: &str = "response.text";
    /// Audit mirror; every publish is copied here
    pub const EVENT_SAVE: &str = "event.save";
    /// Virtual human control events
    pub const EVENT_VIRTUAL_HUMAN: &str = "event.virtual_human";
}

/// The message unit carried on every topic
///
/// Envelopes are immutable once constructed: a handler that wants to
/// transform data builds a new envelope rather than mutating the one it
/// received. Cloning is cheap relative to dispatch; the serialized form on
/// the transport is shared via `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic/event name, also carried inside the payload wire shape
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event-specific data (free-form keyed map, schema varies per type)
    pub payload: Value,

    /// Creation time, RFC 3339, assigned at the point of publish
    pub timestamp: String,

    /// Reserved for versioning/correlation; serialized as `null` when absent
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Envelope {
    /// Create a new envelope with a fresh timestamp and no metadata
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now().to_rfc3339(),
            metadata: None,
        }
    }

    /// Create an envelope with explicit metadata
    pub fn with_metadata(event_type: impl Into<String>, payload: Value, metadata: Value) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(event_type, payload)
        }
    }

    /// Build the audit mirror of this envelope for a publish on `topic`
    ///
    /// The mirror's `type` is forced to the originating topic name and its
    /// payload is the full original envelope, so the audit trail records
    /// exactly what was published and where.
    pub fn audit_copy(&self, topic: &str) -> Self {
        Self {
            event_type: topic.to_string(),
            payload: serde_json::to_value(self).unwrap_or(Value::Null),
            timestamp: self.timestamp.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Serialize for the transport
    pub fn to_bytes(&self) -> Result<Bytes> {
        let vec = serde_json::to_vec(self).map_err(Error::Serialize)?;
        Ok(Bytes::from(vec))
    }

    /// Decode a raw transport message
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(Error::Deserialize)
    }
}
