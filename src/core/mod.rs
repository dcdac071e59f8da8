pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{ConfigError, DecodeError, DetectionError, PipelineError, SpeechError};
pub use types::{Detection, LabeledDetection, RawDetection};
