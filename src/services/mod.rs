pub mod detection;
pub mod localization;
pub mod speech;

// Re-export commonly used services
pub use detection::{filter_detections, Detector, OnnxDetector};
pub use localization::localize;
pub use speech::{SpeechService, SynthesisOutcome};
