//! Face recognition handler
//!
//! Consumes image frame events, runs detection and recognition over the
//! decoded frame and publishes the recognized/unrecognized descriptors on
//! `face_recognition.detect`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::services::FaceRecognizer;

use super::frame_data;

/// `video.frame` / `event.image` → `face_recognition.detect`
pub struct FaceRecognitionHandler {
    bus: Arc<EventBus>,
    recognizer: Arc<dyn FaceRecognizer>,
}

impl FaceRecognitionHandler {
    pub fn new(bus: Arc<EventBus>, recognizer: Arc<dyn FaceRecognizer>) -> Self {
        Self { bus, recognizer }
    }
}

#[async_trait]
impl EventHandler for FaceRecognitionHandler {
    fn name(&self) -> &str {
        "face_recognition"
    }

    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let frame = frame_data(&envelope)?;
        let (recognized, unrecognized) =
            self.recognizer.detect_and_recognize_faces(&frame).await?;

        tracing::debug!(
            source = %envelope.event_type,
            recognized = recognized.len(),
            unrecognized = unrecognized.len(),
            "Faces processed"
        );

        let result = Envelope::new(
            topics::FACE_RECOGNITION_DETECT,
            json!({
                "recognized_faces": recognized,
                "unrecognized_faces": unrecognized,
            }),
        );
        self.bus
            .publish(topics::FACE_RECOGNITION_DETECT, result)
            .await;

        Ok(())
    }
}
