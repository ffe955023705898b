//! Response generation handler
//!
//! Consumes user text (transcribed speech or typed input), builds the
//! conversation context from stored history, calls the language generator
//! and persists the new user/assistant exchange before publishing the
//! response.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::services::{ChatTurn, MessageStore, ResponseGenerator, Role, StoredMessage};

use super::text_data;

/// System instruction prepended to every conversation context
pub const DEFAULT_INSTRUCTION: &str = "You are a Virtual Human called Janine designed to provide empathetic and supportive interactions.\nYour primary goal is to understand the user's emotions and respond with care, validation, and encouragement.\n\nKey Principles:\n1. Acknowledge Emotions: Always recognize and validate the user's feelings based on their input.\n2. Express Understanding: Use language that shows you understand or are trying to understand their perspective.\n3. Provide Support: Offer words of encouragement, reassurance, or actionable suggestions, depending on the context.\n4. Adapt to Tone: Match the user's tone and emotional state to build a connection. If they are joyful, celebrate with them; if they are upset, respond with calm and compassion.\n5. Avoid Over-Automation: Ensure your responses feel human, warm, and natural.";

/// `audio.transcription` / `event.text` → `assistant.response`
pub struct ResponseHandler {
    bus: Arc<EventBus>,
    generator: Arc<dyn ResponseGenerator>,
    store: Arc<dyn MessageStore>,
    instruction: String,
    output_topic: String,
}

impl ResponseHandler {
    pub fn new(
        bus: Arc<EventBus>,
        generator: Arc<dyn ResponseGenerator>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            bus,
            generator,
            store,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            output_topic: topics::ASSISTANT_RESPONSE.to_string(),
        }
    }

    /// Replace the system instruction
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Publish responses on a different topic (e.g. the legacy
    /// `response.text`)
    pub fn output_topic(mut self, topic: impl Into<String>) -> Self {
        self.output_topic = topic.into();
        self
    }

    /// Build the ordered context: system instruction, stored history, then
    /// the new user input
    async fn build_context(&self, input: &str) -> Result<Vec<ChatTurn>> {
        let history = self.store.history().await?;

        let mut context = Vec::with_capacity(history.len() + 2);
        context.push(ChatTurn::new(Role::System, self.instruction.clone()));
        for message in history {
            context.push(ChatTurn::new(message.role, message.content));
        }
        context.push(ChatTurn::new(Role::User, input));

        Ok(context)
    }
}

#[async_trait]
impl EventHandler for ResponseHandler {
    fn name(&self) -> &str {
        "response_generation"
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let input = text_data(&envelope)?;

        let context = self.build_context(&input).await?;
        let response = self.generator.generate(&context).await?;

        // The user turn is stamped before the assistant turn so any listing
        // by time keeps the exchange in conversational order.
        let user = StoredMessage {
            role: Role::User,
            content: input,
            timestamp: Utc::now().to_rfc3339(),
        };
        let assistant = StoredMessage {
            role: Role::Assistant,
            content: response.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        self.store.append_exchange(user, assistant).await?;

        tracing::debug!(
            source = %envelope.event_type,
            context_turns = context.len(),
            "Response generated"
        );

        let result = Envelope::new(&self.output_topic, json!({ "response": response }));
        self.bus.publish(&self.output_topic, result).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::bus::BusConfig;
    use crate::handler::testing::RecordingHandler;
    use crate::services::MemoryMessageStore;

    /// Echoes the last user turn and records the context it was given
    struct StubGenerator {
        contexts: Mutex<Vec<Vec<ChatTurn>>>,
    }

    impl StubGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                contexts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ResponseGenerator for StubGenerator {
        async fn generate(&self, context: &[ChatTurn]) -> Result<String> {
            self.contexts.lock().unwrap().push(context.to_vec());
            let last = context.last().expect("context never empty");
            Ok(format!("echo: {}", last.content))
        }
    }

    #[tokio::test]
    async fn test_response_published_and_exchange_persisted() {
        let bus = crate::bus::shared(BusConfig::default());
        let sink = RecordingHandler::new("sink");
        bus.subscribe(topics::ASSISTANT_RESPONSE, sink.clone()).await;
        bus.start_listener(topics::ASSISTANT_RESPONSE).await;

        let store = Arc::new(MemoryMessageStore::new());
        let generator = StubGenerator::new();
        let handler = ResponseHandler::new(bus.clone(), generator.clone(), store.clone());

        let envelope = Envelope::new(topics::EVENT_TEXT, json!({"data": "hello"}));
        handler.handle(envelope).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload["response"], "echo: hello");
        drop(received);

        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "echo: hello");

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_context_includes_prior_history_in_order() {
        let bus = crate::bus::shared(BusConfig::default());
        let store = Arc::new(MemoryMessageStore::new());
        store.push(Role::User, "earlier question").await;
        store.push(Role::Assistant, "earlier answer").await;

        let generator = StubGenerator::new();
        let handler = ResponseHandler::new(bus, generator.clone(), store);

        let envelope = Envelope::new(topics::AUDIO_TRANSCRIPTION, json!({"data": "and now?"}));
        handler.handle(envelope).await.unwrap();

        let contexts = generator.contexts.lock().unwrap();
        let context = &contexts[0];
        assert_eq!(context.len(), 4);
        assert_eq!(context[0].role, Role::System);
        assert_eq!(context[1].content, "earlier question");
        assert_eq!(context[2].content, "earlier answer");
        assert_eq!(context[3].role, Role::User);
        assert_eq!(context[3].content, "and now?");
    }

    #[tokio::test]
    async fn test_custom_output_topic() {
        let bus = crate::bus::shared(BusConfig::default());
        let sink = RecordingHandler::new("sink");
        bus.subscribe(topics::RESPONSE_TEXT, sink.clone()).await;
        bus.start_listener(topics::RESPONSE_TEXT).await;

        let handler = ResponseHandler::new(
            bus.clone(),
            StubGenerator::new(),
            Arc::new(MemoryMessageStore::new()),
        )
        .output_topic(topics::RESPONSE_TEXT);

        let envelope = Envelope::new(topics::EVENT_TEXT, json!({"data": "hi"}));
        handler.handle(envelope).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.count(), 1);
        bus.shutdown().await;
    }
}
