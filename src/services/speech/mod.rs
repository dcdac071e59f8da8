// Speech synthesis adapter over the Google Translate TTS front
//
// A missing audio clip must never fail a detection response, so the public
// surface of this service cannot return an error: every failure collapses
// into `SynthesisOutcome::Failed`, which callers render as an empty audio
// field.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::errors::SpeechError;
use crate::utils::Metrics;

/// Result of one synthesis attempt.
///
/// `Synthesized` carries the base64-encoded audio bytes; `Failed` is the
/// sentinel for any provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Synthesized(String),
    Failed,
}

impl SynthesisOutcome {
    /// The value of the response's `audio` field: base64 audio on success,
    /// empty string on failure.
    pub fn into_audio_field(self) -> String {
        match self {
            SynthesisOutcome::Synthesized(encoded) => encoded,
            SynthesisOutcome::Failed => String::new(),
        }
    }
}

pub struct SpeechService {
    config: Arc<Config>,
    http_client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl SpeechService {
    pub fn new(config: Arc<Config>, metrics: Option<Metrics>) -> Result<Self> {
        // No request timeout: a slow provider blocks its request, per the
        // service's no-timeout contract. Connection pooling only.
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            metrics,
        })
    }

    /// Synthesize spoken audio for `text` in `language`.
    ///
    /// One provider call per invocation; no caching, no retries. Never
    /// returns an error: failures become `SynthesisOutcome::Failed`.
    pub async fn synthesize(&self, text: &str, language: &str) -> SynthesisOutcome {
        match self.try_synthesize(text, language).await {
            Ok(audio_bytes) => {
                debug!("Synthesized {} audio bytes for {:?}", audio_bytes.len(), text);
                if let Some(ref m) = self.metrics {
                    m.record_synthesis(true);
                }
                SynthesisOutcome::Synthesized(general_purpose::STANDARD.encode(audio_bytes))
            }
            Err(e) => {
                warn!("Speech synthesis failed for {:?}: {}", text, e);
                if let Some(ref m) = self.metrics {
                    m.record_synthesis(false);
                }
                SynthesisOutcome::Failed
            }
        }
    }

    async fn try_synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .http_client
            .get(&self.config.speech.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("q", text),
                ("tl", language),
                ("client", "tw-ob"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::ProviderStatus(status.as_u16()));
        }

        let audio_bytes = response.bytes().await?;
        if audio_bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        Ok(audio_bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_provider_yields_failed() {
        // Config::for_tests points the endpoint at a port nothing listens on
        let config = Arc::new(Config::for_tests());
        let service = SpeechService::new(config, None).unwrap();

        let outcome = service.synthesize("Beş Türk Lirası", "tr").await;
        assert_eq!(outcome, SynthesisOutcome::Failed);
    }

    #[test]
    fn test_failed_outcome_is_empty_audio_field() {
        assert_eq!(SynthesisOutcome::Failed.into_audio_field(), "");
    }

    #[test]
    fn test_synthesized_outcome_keeps_encoding() {
        let outcome = SynthesisOutcome::Synthesized("c2VzIHZlcmlzaQ==".to_string());
        assert_eq!(outcome.into_audio_field(), "c2VzIHZlcmlzaQ==");
    }
}
