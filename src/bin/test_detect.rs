//! Quick detection test binary - run the detector against a local image
//! Run with: cargo run --release --bin test_detect -- <image_path>

use anyhow::Result;
use banknote_voice::core::Config;
use banknote_voice::services::detection::{filter_detections, Detector, OnnxDetector};
use banknote_voice::services::localization::localize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("banknote_voice=debug")
        .with_target(false)
        .init();

    // Get image path from args
    let args: Vec<String> = std::env::args().collect();
    let sample_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "test_sample.png".to_string()
    };

    if !Path::new(&sample_path).exists() {
        eprintln!("Image not found: {}", sample_path);
        std::process::exit(1);
    }

    info!("Loading image: {}", sample_path);
    let image = image::open(&sample_path)?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let config = Arc::new(Config::new()?);
    let detector = OnnxDetector::new(config.clone()).await?;
    info!("Detector ready on {}", detector.device_type());

    let raw = detector.infer(&image).await?;
    info!("Model returned {} raw detections", raw.len());

    let accepted = filter_detections(
        raw,
        config.confidence_threshold(),
        detector.class_names(),
    );

    println!("\n=== Results ===");
    if accepted.is_empty() {
        println!("  (no banknotes above threshold {})", config.confidence_threshold());
    } else {
        for (i, det) in accepted.iter().enumerate() {
            println!(
                "  {}. {} ({}) conf={:.3}",
                i + 1,
                det.label,
                localize(&det.label),
                det.confidence
            );
        }
    }

    Ok(())
}
