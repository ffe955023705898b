//! Canonical handler pipeline
//!
//! The processing chains the backend runs on top of the bus:
//!
//! ```text
//! video.frame ──┬──► EmotionHandler ─────────► emotion.analysis
//! event.image ──┘└─► FaceRecognitionHandler ─► face_recognition.detect
//! audio.raw ───────► TranscriptionHandler ───► audio.transcription
//! audio.transcription ─┬► ResponseHandler ───► assistant.response
//! event.text ──────────┘
//! event.save ──────► SaveEventHandler ───────► event store
//! ```
//!
//! Handlers on the same input topic are independent registrations; one
//! failing never blocks the others.

pub mod emotion;
pub mod faces;
pub mod persist;
pub mod respond;
pub mod transcribe;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::bus::{topics, Envelope, EventBus};
use crate::error::{Error, Result};
use crate::services::{
    EmotionDetector, EventStore, FaceRecognizer, MessageStore, ResponseGenerator, Transcriber,
};

pub use emotion::EmotionHandler;
pub use faces::FaceRecognitionHandler;
pub use persist::SaveEventHandler;
pub use respond::{ResponseHandler, DEFAULT_INSTRUCTION};
pub use transcribe::TranscriptionHandler;

/// Extract and base64-decode `payload.data` (image frames, audio clips)
pub(crate) fn frame_data(envelope: &Envelope) -> Result<Vec<u8>> {
    let data = envelope.payload["data"]
        .as_str()
        .ok_or_else(|| Error::InvalidEnvelope("missing 'data' in payload".into()))?;
    STANDARD
        .decode(data)
        .map_err(|e| Error::InvalidEnvelope(format!("payload data is not base64: {e}")))
}

/// Extract `payload.data` as text
pub(crate) fn text_data(envelope: &Envelope) -> Result<String> {
    envelope.payload["data"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidEnvelope("missing 'data' in payload".into()))
}

/// Collaborators the canonical pipeline is wired against
#[derive(Clone)]
pub struct PipelineServices {
    pub emotions: Arc<dyn EmotionDetector>,
    pub faces: Arc<dyn FaceRecognizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub events: Arc<dyn EventStore>,
    pub messages: Arc<dyn MessageStore>,
}

/// Register the canonical handlers and start a listener for every topic the
/// backend consumes
///
/// Image handlers are registered on both `video.frame` and its legacy alias
/// `event.image`; the responder consumes transcriptions and typed text
/// alike. A listener is also started for `event.virtual_human` so gateway
/// clients can exchange control events on it even though no built-in handler
/// consumes it.
pub async fn initialize(bus: &Arc<EventBus>, services: PipelineServices) {
    let emotion = Arc::new(EmotionHandler::new(bus.clone(), services.emotions));
    let faces = Arc::new(FaceRecognitionHandler::new(bus.clone(), services.faces));
    let transcribe = Arc::new(TranscriptionHandler::new(bus.clone(), services.transcriber));
    let respond = Arc::new(ResponseHandler::new(
        bus.clone(),
        services.generator,
        services.messages,
    ));
    let persist = Arc::new(SaveEventHandler::new(services.events));

    bus.subscribe(topics::VIDEO_FRAME, emotion.clone()).await;
    bus.subscribe(topics::VIDEO_FRAME, faces.clone()).await;
    bus.subscribe(topics::EVENT_IMAGE, emotion).await;
    bus.subscribe(topics::EVENT_IMAGE, faces).await;
    bus.subscribe(topics::AUDIO_RAW, transcribe).await;
    bus.subscribe(topics::AUDIO_TRANSCRIPTION, respond.clone()).await;
    bus.subscribe(topics::EVENT_TEXT, respond).await;
    bus.subscribe(topics::EVENT_SAVE, persist).await;

    for topic in [
        topics::VIDEO_FRAME,
        topics::EVENT_IMAGE,
        topics::AUDIO_RAW,
        topics::AUDIO_TRANSCRIPTION,
        topics::EVENT_TEXT,
        topics::EVENT_SAVE,
        topics::EVENT_VIRTUAL_HUMAN,
    ] {
        bus.start_listener(topic).await;
    }

    tracing::info!("Pipeline handlers registered");
}
