//! Crate-wide error types
//!
//! Every fault in the system maps onto one of these variants. The broker
//! itself never surfaces transport faults to publishers (publish is
//! best-effort); these types are what handlers, services and the gateway
//! propagate internally before the dispatch site logs them.

use thiserror::Error;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type covering the bus, handlers, services and the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope could not be serialized for the transport
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Raw transport message could not be decoded into an envelope
    #[error("failed to deserialize message: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// I/O failure on a gateway connection
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A topic channel or outbound queue was closed
    #[error("channel closed for topic '{0}'")]
    ChannelClosed(String),

    /// A subscriber callback failed while handling an envelope
    #[error("handler '{handler}' failed on topic '{topic}': {source}")]
    Handler {
        topic: String,
        handler: String,
        #[source]
        source: Box<Error>,
    },

    /// An external collaborator (emotion, faces, transcription, LLM) failed
    #[error("service '{service}' failed: {message}")]
    Service { service: String, message: String },

    /// The persistence store rejected a write
    #[error("store error: {0}")]
    Store(String),

    /// An inbound envelope was missing a required field
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

impl Error {
    /// Build a collaborator failure
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the topic and handler it occurred in
    pub fn in_handler(self, topic: impl Into<String>, handler: impl Into<String>) -> Self {
        Error::Handler {
            topic: topic.into(),
            handler: handler.into(),
            source: Box::new(self),
        }
    }
}
