// Library exports for the banknote detection voice backend

pub mod api;
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ConfigError, DecodeError, DetectionError, PipelineError, SpeechError},
    types::{Detection, LabeledDetection, RawDetection},
};

pub use crate::api::{router, AppState};

pub use crate::orchestration::pipeline::DetectionPipeline;

pub use crate::services::{
    filter_detections, localize, Detector, OnnxDetector, SpeechService, SynthesisOutcome,
};

pub use crate::utils::{decode_image, Metrics};
