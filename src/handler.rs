//! Handler trait
//!
//! A handler is a unit of processing logic bound to one topic. Handlers are
//! registered on the bus as `Arc<dyn EventHandler>`; the `Arc` pointer is the
//! handler's identity for unsubscription, so registering the same `Arc` twice
//! means it is invoked twice per envelope.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::Envelope;
use crate::error::Result;

/// A subscriber callback invoked for every envelope dispatched on its topic
///
/// Handlers must be independent: a failure returned here is logged at the
/// dispatch site and never stops sibling handlers or the topic's listener.
/// Handlers that call external collaborators should catch those failures and
/// either publish a degraded event or publish nothing.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in dispatch logs
    fn name(&self) -> &str;

    /// Process one envelope
    async fn handle(&self, envelope: Envelope) -> Result<()>;
}

/// Shared handler reference as stored by the registry
pub type HandlerRef = Arc<dyn EventHandler>;

/// Check whether two handler references are the same registration identity
pub fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    Arc::ptr_eq(a, b)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small handlers shared by unit tests across the crate

    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    /// Records every envelope it receives
    pub struct RecordingHandler {
        name: String,
        pub received: Mutex<Vec<Envelope>>,
    }

    impl RecordingHandler {
        pub fn new(name: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                received: Mutex::new(Vec::new()),
            })
        }

        pub fn count(&self) -> usize {
            self.received.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, envelope: Envelope) -> Result<()> {
            self.received.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    /// Always fails; used to prove sibling handlers still run
    pub struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _envelope: Envelope) -> Result<()> {
            Err(Error::service("test", "always fails"))
        }
    }
}
