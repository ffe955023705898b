//! Emotion analysis handler
//!
//! Consumes image frame events, runs the emotion detection service over the
//! decoded frame and publishes the result on `emotion.analysis`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::services::EmotionDetector;

use super::frame_data;

/// `video.frame` / `event.image` → `emotion.analysis`
pub struct EmotionHandler {
    bus: Arc<EventBus>,
    detector: Arc<dyn EmotionDetector>,
}

impl EmotionHandler {
    pub fn new(bus: Arc<EventBus>, detector: Arc<dyn EmotionDetector>) -> Self {
        Self { bus, detector }
    }
}

#[async_trait]
impl EventHandler for EmotionHandler {
    fn name(&self) -> &str {
        "emotion_analysis"
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let frame = frame_data(&envelope)?;
        let emotions = self.detector.detect_emotions(&frame).await?;

        tracing::debug!(
            source = %envelope.event_type,
            emotions = emotions.len(),
            "Emotions analyzed"
        );

        let result = Envelope::new(
            topics::EMOTION_ANALYSIS,
            json!({ "emotions": emotions }),
        );
        self.bus.publish(topics::EMOTION_ANALYSIS, result).await;

        Ok(())
    }
}
