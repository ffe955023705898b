//! End-to-end gateway demo with stub collaborators
//!
//! Run with: cargo run --example chat_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example chat_server                    # binds to 0.0.0.0:7878
//!   cargo run --example chat_server localhost          # binds to 127.0.0.1:7878
//!   cargo run --example chat_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Talk to it with netcat (one JSON message per line):
//!
//!   nc localhost 7878
//!   {"type":"text","payload":{"data":"hello there"}}
//!
//! The server answers with a `connection_established` line, then an
//! `assistant.response` envelope for every text message. Image and audio
//! messages flow through the emotion/face/transcription handlers with stub
//! services standing in for the real models.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use vhbus::bus::{BusConfig, EventBus};
use vhbus::pipeline::{self, PipelineServices};
use vhbus::services::{
    ChatTurn, EmotionDetector, FaceDescriptor, FaceRecognizer, MemoryEventStore,
    MemoryMessageStore, ResponseGenerator, Transcriber,
};
use vhbus::{GatewayConfig, GatewayServer, Result};

/// Reports a fixed neutral reading for every frame
struct StubEmotions;

#[async_trait]
impl EmotionDetector for StubEmotions {
    async fn detect_emotions(&self, _frame: &[u8]) -> Result<HashMap<String, f64>> {
        Ok(HashMap::from([
            ("neutral".to_string(), 0.7),
            ("happy".to_string(), 0.2),
        ]))
    }
}

/// Treats every frame as one unrecognized face
struct StubFaces;

#[async_trait]
impl FaceRecognizer for StubFaces {
    async fn detect_and_recognize_faces(
        &self,
        _frame: &[u8],
    ) -> Result<(Vec<FaceDescriptor>, Vec<FaceDescriptor>)> {
        Ok((Vec::new(), vec![vec![0.0; 8]]))
    }
}

/// Pretends every clip says the same thing
struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        _sample_rate: u32,
        _sample_width: u16,
    ) -> Result<Option<String>> {
        if audio.is_empty() {
            return Ok(None);
        }
        Ok(Some("transcribed audio".to_string()))
    }
}

/// Echo generator standing in for the language model
struct EchoGenerator;

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, context: &[ChatTurn]) -> Result<String> {
        let last = context.last().map(|t| t.content.as_str()).unwrap_or("");
        Ok(format!("It sounds like you said: \"{last}\". Tell me more."))
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7878
/// - "127.0.0.1:9000" -> 127.0.0.1:9000
fn parse_bind_addr(arg: &str) -> std::result::Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 7878;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:7878".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vhbus=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let bus = Arc::new(EventBus::with_config(BusConfig::default()));
    let events = Arc::new(MemoryEventStore::new());

    let services = PipelineServices {
        emotions: Arc::new(StubEmotions),
        faces: Arc::new(StubFaces),
        transcriber: Arc::new(StubTranscriber),
        generator: Arc::new(EchoGenerator),
        events: events.clone(),
        messages: Arc::new(MemoryMessageStore::new()),
    };
    pipeline::initialize(&bus, services).await;

    let config = GatewayConfig::default().bind(bind_addr);
    let server = GatewayServer::new(config, bus.clone());

    println!("Gateway listening on {}", server.bind_addr());
    println!();
    println!("Try: nc localhost {}", bind_addr.port());
    println!("     {{\"type\":\"text\",\"payload\":{{\"data\":\"hello there\"}}}}");
    println!();

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    bus.shutdown().await;
    println!("Audit records persisted: {}", events.len().await);

    Ok(())
}
