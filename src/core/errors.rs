// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use thiserror::Error;

/// Image decoding errors, always a client-input problem
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty image payload")]
    EmptyPayload,

    #[error("image decoding failed: {0}")]
    Malformed(#[from] image::ImageError),
}

/// Detection service errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("ONNX inference failed: {0}")]
    InferenceFailed(#[from] ort::Error),

    #[error("unexpected model output shape: {0}")]
    OutputShape(String),
}

/// Speech synthesis errors
///
/// These never cross the adapter boundary: `SpeechService::synthesize`
/// collapses every variant into `SynthesisOutcome::Failed`.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("TTS request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("TTS provider returned status {0}")]
    ProviderStatus(u16),

    #[error("TTS provider returned an empty audio payload")]
    EmptyAudio,
}

/// Pipeline orchestration errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Detection(#[from] DetectionError),

    #[error("worker task failed: {0}")]
    TaskJoin(String),
}

impl PipelineError {
    /// Decode failures are the caller's fault; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Decode(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("IoU threshold must be in [0.0, 1.0], got {0}")]
    InvalidIoUThreshold(f32),

    #[error("Invalid detection config: {0}")]
    InvalidDetectionConfig(String),

    #[error("Invalid speech config: {0}")]
    InvalidSpeechConfig(String),
}

// Convenience type aliases for Results
pub type DetectionResult<T> = Result<T, DetectionError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
