//! Speech transcription handler
//!
//! Consumes raw audio events and publishes the transcription, if any. A
//! silent clip (the transcriber returning `None`) yields no publish at all.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::services::Transcriber;

use super::frame_data;

/// Fallback sample rate when the payload omits one
const DEFAULT_SAMPLE_RATE: u32 = 16_000;
/// Fallback sample width in bytes
const DEFAULT_SAMPLE_WIDTH: u16 = 2;

/// `audio.raw` → `audio.transcription`
pub struct TranscriptionHandler {
    bus: Arc<EventBus>,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionHandler {
    pub fn new(bus: Arc<EventBus>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { bus, transcriber }
    }
}

#[async_trait]
impl EventHandler for TranscriptionHandler {
    fn name(&self) -> &str {
        "audio_transcription"
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let audio = frame_data(&envelope)?;
        let sample_rate = envelope.payload["sample_rate"]
            .as_u64()
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let sample_width = envelope.payload["sample_width"]
            .as_u64()
            .map(|v| v as u16)
            .unwrap_or(DEFAULT_SAMPLE_WIDTH);

        let text = self
            .transcriber
            .transcribe(&audio, sample_rate, sample_width)
            .await?;

        let text = match text {
            Some(text) => text,
            None => {
                tracing::debug!(sample_rate = sample_rate, "No speech detected, nothing published");
                return Ok(());
            }
        };

        tracing::debug!(chars = text.len(), "Audio transcribed");

        let result = Envelope::new(topics::AUDIO_TRANSCRIPTION, json!({ "data": text }));
        self.bus.publish(topics::AUDIO_TRANSCRIPTION, result).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    use super::*;
    use crate::bus::BusConfig;
    use crate::handler::testing::RecordingHandler;

    struct StubTranscriber {
        text: Option<String>,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _sample_rate: u32,
            _sample_width: u16,
        ) -> Result<Option<String>> {
            Ok(self.text.clone())
        }
    }

    fn audio_envelope() -> Envelope {
        Envelope::new(
            topics::AUDIO_RAW,
            json!({
                "data": STANDARD.encode(b"pcm bytes"),
                "sample_rate": 16000,
                "sample_width": 2,
            }),
        )
    }

    #[tokio::test]
    async fn test_transcription_published() {
        let bus = crate::bus::shared(BusConfig::default());
        let sink = RecordingHandler::new("sink");
        bus.subscribe(topics::AUDIO_TRANSCRIPTION, sink.clone())
            .await;
        bus.start_listener(topics::AUDIO_TRANSCRIPTION).await;

        let handler = TranscriptionHandler::new(
            bus.clone(),
            Arc::new(StubTranscriber {
                text: Some("hello there".into()),
            }),
        );

        handler.handle(audio_envelope()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload["data"], "hello there");
        drop(received);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_silence_publishes_nothing() {
        let bus = crate::bus::shared(BusConfig::default());
        let sink = RecordingHandler::new("sink");
        bus.subscribe(topics::AUDIO_TRANSCRIPTION, sink.clone())
            .await;
        bus.start_listener(topics::AUDIO_TRANSCRIPTION).await;

        let handler =
            TranscriptionHandler::new(bus.clone(), Arc::new(StubTranscriber { text: None }));

        handler.handle(audio_envelope()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.count(), 0);
        bus.shutdown().await;
    }
}
