// Main entry point for the banknote detection voice backend

use banknote_voice::{
    api::{router, AppState},
    core::Config,
    orchestration::pipeline::DetectionPipeline,
    services::{detection::OnnxDetector, speech::SpeechService},
    utils::Metrics,
};

use anyhow::{Context, Result};
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "banknote_voice={},ort=off",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== BANKNOTE DETECTION VOICE BACKEND ===");
    info!(
        "Config: threshold={} model={} tts_lang={}",
        config.confidence_threshold(),
        config.detection.model_path,
        config.speech.language
    );

    // Initialize metrics
    let metrics = Metrics::new();

    // Load the detector and wire the pipeline
    info!("Initializing detection pipeline...");
    let detector = Arc::new(OnnxDetector::new(config.clone()).await?);
    let speech = SpeechService::new(config.clone(), Some(metrics.clone()))?;
    let pipeline = Arc::new(DetectionPipeline::new(
        config.clone(),
        detector,
        speech,
    ));

    let state = AppState {
        config: config.clone(),
        pipeline,
        metrics,
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    if let Some(ip) = local_ip() {
        // The address a phone on the same network should be pointed at
        info!(
            "Reachable on the local network at http://{}:{}",
            ip,
            config.server_port()
        );
    }
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /        - Root endpoint");
    info!("  GET  /health  - Health check");
    info!("  GET  /metrics - Prometheus metrics");
    info!("  GET  /stats   - Detailed statistics");
    info!("  POST /detect  - Detect banknotes (multipart/form-data)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Resolve the machine's outward-facing local IP by opening a UDP socket
/// towards a public address. No packet is actually sent.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
