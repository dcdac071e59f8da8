// Detection pipeline: the per-request workflow coordinator
//
// Runs decode → infer → filter → localize/synthesize strictly sequentially
// within one request. Synthesis failures degrade to an empty audio field for
// that item; decode and inference failures abort the request.

use std::sync::Arc;
use tracing::debug;

use crate::core::config::Config;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::Detection;
use crate::services::detection::{filter_detections, Detector};
use crate::services::localization::localize;
use crate::services::speech::SpeechService;
use crate::utils::image_ops::decode_image;

pub struct DetectionPipeline {
    config: Arc<Config>,
    detector: Arc<dyn Detector>,
    speech: SpeechService,
}

impl DetectionPipeline {
    pub fn new(config: Arc<Config>, detector: Arc<dyn Detector>, speech: SpeechService) -> Self {
        Self {
            config,
            detector,
            speech,
        }
    }

    /// Run one uploaded payload through the full detection-to-response flow.
    pub async fn process(&self, payload: &[u8]) -> PipelineResult<Vec<Detection>> {
        // Decoding is CPU-bound; keep it off the async runtime
        let bytes = payload.to_vec();
        let image = tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| PipelineError::TaskJoin(e.to_string()))??;
        debug!("Image decoded: {}x{}", image.width(), image.height());

        let raw = self.detector.infer(&image).await?;
        debug!("Model returned {} raw detections", raw.len());

        let accepted = filter_detections(
            raw,
            self.config.confidence_threshold(),
            self.detector.class_names(),
        );

        let mut detections = Vec::with_capacity(accepted.len());
        for item in accepted {
            let turkish_label = localize(&item.label).to_string();
            // One synthesis call per detection, each awaited before the next
            let audio = self
                .speech
                .synthesize(&turkish_label, &self.config.speech.language)
                .await
                .into_audio_field();

            detections.push(Detection {
                label: item.label,
                turkish_label,
                confidence: item.confidence,
                audio,
            });
        }

        debug!("Pipeline produced {} detections", detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{DetectionResult, PipelineError};
    use crate::core::types::RawDetection;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDetector {
        detections: Vec<RawDetection>,
        class_names: Vec<String>,
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn new(detections: Vec<RawDetection>, class_names: &[&str]) -> Self {
            Self {
                detections,
                class_names: class_names.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Detector for StubDetector {
        async fn infer(&self, _image: &DynamicImage) -> DetectionResult<Vec<RawDetection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }

        fn class_names(&self) -> &[String] {
            &self.class_names
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([120, 80, 40])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn raw(confidence: f32, class_id: usize) -> RawDetection {
        RawDetection {
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 50.0,
            confidence,
            class_id,
        }
    }

    fn pipeline_with(detector: Arc<StubDetector>) -> DetectionPipeline {
        // Config::for_tests uses an unreachable TTS endpoint, so every
        // synthesis attempt fails and degrades to an empty audio field
        let config = Arc::new(Config::for_tests());
        let speech = SpeechService::new(config.clone(), None).unwrap();
        DetectionPipeline::new(config, detector, speech)
    }

    #[tokio::test]
    async fn test_synthesis_failure_does_not_abort_request() {
        let detector = Arc::new(StubDetector::new(
            vec![raw(0.9, 0), raw(0.85, 1)],
            &["5TL", "10TL"],
        ));
        let pipeline = pipeline_with(detector.clone());

        let detections = pipeline.process(&png_bytes()).await.unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "5TL");
        assert_eq!(detections[0].turkish_label, "Beş Türk Lirası");
        assert_eq!(detections[0].audio, "");
        assert_eq!(detections[1].label, "10TL");
        assert_eq!(detections[1].audio, "");
    }

    #[tokio::test]
    async fn test_below_threshold_detections_are_dropped() {
        let detector = Arc::new(StubDetector::new(
            vec![raw(0.7599, 0), raw(0.76, 1)],
            &["5TL", "10TL"],
        ));
        let pipeline = pipeline_with(detector);

        let detections = pipeline.process(&png_bytes()).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "10TL");
        assert_eq!(detections[0].confidence, 0.76);
    }

    #[tokio::test]
    async fn test_zero_detections_is_a_valid_outcome() {
        let detector = Arc::new(StubDetector::new(vec![], &["5TL"]));
        let pipeline = pipeline_with(detector);

        let detections = pipeline.process(&png_bytes()).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_unlocalized_label_falls_back_to_class_name() {
        let detector = Arc::new(StubDetector::new(vec![raw(0.9, 0)], &["1EUR"]));
        let pipeline = pipeline_with(detector);

        let detections = pipeline.process(&png_bytes()).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "1EUR");
        assert_eq!(detections[0].turkish_label, "1EUR");
    }

    #[tokio::test]
    async fn test_undecodable_payload_never_reaches_the_detector() {
        let detector = Arc::new(StubDetector::new(vec![raw(0.9, 0)], &["5TL"]));
        let pipeline = pipeline_with(detector.clone());

        let result = pipeline.process(b"not an image").await;

        assert!(matches!(result, Err(PipelineError::Decode(_))));
        assert_eq!(detector.call_count(), 0);
    }
}
