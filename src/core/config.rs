use crate::core::errors::ConfigError;
use std::env;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub max_upload_bytes: usize,
}

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum score for a detection to appear in a response (inclusive)
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub target_size: u32,
    pub model_path: String,
    /// Number of ONNX sessions kept in the pool (controls inference parallelism)
    pub session_pool_size: usize,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// TTS provider endpoint (Google Translate TTS front, same as gTTS)
    pub endpoint: String,
    /// BCP-47-ish language code sent with every synthesis call
    pub language: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub speech: SpeechConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25 * 1024 * 1024),
            },
            detection: DetectionConfig {
                confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.76),
                iou_threshold: env::var("IOU_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.45),
                target_size: env::var("TARGET_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(640),
                model_path: env::var("DETECTOR_MODEL_PATH")
                    .unwrap_or_else(|_| "models/banknotes.onnx".to_string()),
                session_pool_size: env::var("ONNX_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| std::cmp::max(num_cpus::get() / 2, 2)),
            },
            speech: SpeechConfig {
                endpoint: env::var("TTS_ENDPOINT")
                    .unwrap_or_else(|_| "https://translate.google.com/translate_tts".to_string()),
                language: env::var("TTS_LANGUAGE").unwrap_or_else(|_| "tr".to_string()),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.detection.confidence_threshold,
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(ConfigError::InvalidIoUThreshold(self.detection.iou_threshold));
        }

        if !(320..=2048).contains(&self.detection.target_size) {
            return Err(ConfigError::InvalidDetectionConfig(format!(
                "target_size must be between 320 and 2048, got {}",
                self.detection.target_size
            )));
        }

        if self.detection.session_pool_size == 0 {
            return Err(ConfigError::InvalidDetectionConfig(
                "session_pool_size must be > 0".to_string(),
            ));
        }

        if self.speech.endpoint.is_empty() {
            return Err(ConfigError::InvalidSpeechConfig(
                "TTS endpoint must not be empty".to_string(),
            ));
        }

        if self.speech.language.is_empty() {
            return Err(ConfigError::InvalidSpeechConfig(
                "TTS language must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.detection.confidence_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.detection.iou_threshold
    }

    pub fn target_size(&self) -> u32 {
        self.detection.target_size
    }

    pub fn session_pool_size(&self) -> usize {
        self.detection.session_pool_size
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for tests: reference threshold, one pooled
    /// session, and a TTS endpoint nothing listens on (so every synthesis
    /// attempt fails fast).
    pub(crate) fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: Level::WARN,
                max_upload_bytes: 25 * 1024 * 1024,
            },
            detection: DetectionConfig {
                confidence_threshold: 0.76,
                iou_threshold: 0.45,
                target_size: 640,
                model_path: "models/banknotes.onnx".to_string(),
                session_pool_size: 1,
            },
            speech: SpeechConfig {
                endpoint: "http://127.0.0.1:1/translate_tts".to_string(),
                language: "tr".to_string(),
            },
        }
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors
