use crate::core::config::Config;
use crate::core::errors::{DetectionError, DetectionResult};
use crate::core::types::{LabeledDetection, RawDetection};
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{s, Array4, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::CPUExecutionProvider;

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, info, trace};

/// Class-name table of the trained banknote model, indexed by class id.
/// Must stay in the exact order the model was trained with.
const CLASS_NAMES: [&str; 6] = ["5TL", "10TL", "20TL", "50TL", "100TL", "200TL"];

/// Minimum per-candidate score for a box to leave the model-level decoder.
/// This is YOLO postprocessing, not the response threshold; that one is
/// applied later by `filter_detections`.
const RAW_SCORE_FLOOR: f32 = 0.25;

/// The opaque detection-model boundary: an image in, raw boxes out, plus the
/// model's class-name table.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn infer(&self, image: &DynamicImage) -> DetectionResult<Vec<RawDetection>>;
    fn class_names(&self) -> &[String];
}

/// Session pool for concurrent inference
pub struct SessionPool {
    sender: Sender<Session>,
    receiver: Arc<tokio::sync::Mutex<Receiver<Session>>>,
}

impl SessionPool {
    async fn acquire(&self) -> Session {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await.expect("Session pool exhausted")
    }

    async fn release(&self, session: Session) {
        self.sender
            .send(session)
            .await
            .expect("Failed to return session to pool");
    }
}

pub struct OnnxDetector {
    session_pool: Arc<SessionPool>,
    config: Arc<Config>,
    class_names: Vec<String>,
    device_type: String,
}

impl OnnxDetector {
    /// Load the model artifact and fill the session pool.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let pool_size = config.session_pool_size();
        let model_path = config.detection.model_path.clone();

        let model_bytes = Arc::new(std::fs::read(&model_path).with_context(|| {
            format!("Failed to read detector model from {}", model_path)
        })?);
        info!(
            "Loading detector model from {} ({} bytes)...",
            model_path,
            model_bytes.len()
        );

        let (device_type, first_session) = Self::build_session(&model_bytes)?;

        let (sender, receiver) = channel(pool_size);
        sender
            .send(first_session)
            .await
            .map_err(|_| anyhow::anyhow!("Failed to initialize session pool"))?;

        // Create remaining sessions in parallel for faster startup
        if pool_size > 1 {
            let mut tasks = Vec::new();

            for i in 1..pool_size {
                let bytes = Arc::clone(&model_bytes);
                let task = tokio::task::spawn_blocking(move || {
                    debug!("Creating session {} of {}", i + 1, pool_size);
                    Self::build_session(&bytes)
                });
                tasks.push(task);
            }

            for task in tasks {
                let (_, session) = task
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to spawn session creation: {}", e))??;
                sender
                    .send(session)
                    .await
                    .map_err(|_| anyhow::anyhow!("Failed to add session to pool"))?;
            }
        }

        let session_pool = Arc::new(SessionPool {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        });

        info!("✓ Detection: {} ({} sessions)", device_type, pool_size);

        Ok(Self {
            session_pool,
            config,
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            device_type,
        })
    }

    fn build_session(model_bytes: &[u8]) -> Result<(String, Session)> {
        // CUDA is optional: try it when compiled in, otherwise stay on CPU
        #[cfg(feature = "cuda")]
        {
            if let Ok(session) = Session::builder()
                .and_then(|b| b.with_execution_providers([CUDAExecutionProvider::default().build()]))
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.with_intra_threads(num_cpus::get()))
                .and_then(|b| b.commit_from_memory(model_bytes))
            {
                info!("✓ Using CUDA acceleration");
                return Ok(("CUDA".to_string(), session));
            }
        }

        let session = Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus::get())?
            .commit_from_memory(model_bytes)?;

        Ok(("CPU".to_string(), session))
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    fn preprocess(&self, img: &DynamicImage) -> (Array4<f32>, f32, f32) {
        let target_size = self.config.target_size();
        trace!(
            "Preprocessing image: {}x{} → {}x{}",
            img.width(),
            img.height(),
            target_size,
            target_size
        );

        let resized = img.resize_exact(
            target_size,
            target_size,
            image::imageops::FilterType::Triangle,
        );
        let rgb_img = resized.to_rgb8();

        let target = target_size as usize;
        let mut array = Array4::<f32>::zeros((1, 3, target, target));
        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            array[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            array[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            array[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let sx = img.width() as f32 / target_size as f32;
        let sy = img.height() as f32 / target_size as f32;
        (array, sx, sy)
    }

    fn run_session(session: &mut Session, input: Value) -> DetectionResult<(Vec<usize>, Vec<f32>)> {
        let outputs = session.run(ort::inputs!["images" => input])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.into_iter().map(|&d| d as usize).collect();
        Ok((dims, data.to_vec()))
    }

    /// Decode the YOLO output tensor `[1, 4+classes, candidates]` into boxes
    /// in source-image coordinates.
    fn decode_output(
        &self,
        dims: &[usize],
        data: &[f32],
        sx: f32,
        sy: f32,
    ) -> DetectionResult<Vec<RawDetection>> {
        if dims.len() != 3 || dims[0] != 1 || dims[1] < 5 {
            return Err(DetectionError::OutputShape(format!(
                "expected [1, 4+classes, candidates], got {:?}",
                dims
            )));
        }

        let view = ArrayViewD::from_shape(IxDyn(dims), data)
            .map_err(|e| DetectionError::OutputShape(e.to_string()))?;
        let view = view.index_axis(Axis(0), 0);
        let num_candidates = view.shape()[1];

        let mut detections = Vec::new();
        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let mut class_id = 0usize;
            let mut max_score = f32::NEG_INFINITY;
            for (idx, &score) in scores.iter().enumerate() {
                if score > max_score {
                    max_score = score;
                    class_id = idx;
                }
            }

            if max_score >= RAW_SCORE_FLOOR {
                let cx = view[[0, i]];
                let cy = view[[1, i]];
                let w = view[[2, i]];
                let h = view[[3, i]];

                detections.push(RawDetection {
                    x1: (cx - w / 2.0) * sx,
                    y1: (cy - h / 2.0) * sy,
                    x2: (cx + w / 2.0) * sx,
                    y2: (cy + h / 2.0) * sy,
                    confidence: max_score,
                    class_id,
                });
            }
        }

        trace!("{} candidates above raw score floor", detections.len());
        Ok(detections)
    }
}

#[async_trait]
impl Detector for OnnxDetector {
    async fn infer(&self, image: &DynamicImage) -> DetectionResult<Vec<RawDetection>> {
        let inference_start = std::time::Instant::now();
        let (input, sx, sy) = self.preprocess(image);
        let input_value = Value::from_array(input)?;

        let mut session = self.session_pool.acquire().await;
        let run_result = Self::run_session(&mut session, input_value.into());
        self.session_pool.release(session).await;
        let (dims, data) = run_result?;

        debug!(
            "✓ Inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        let raw = self.decode_output(&dims, &data, sx, sy)?;
        let kept = nms(raw, self.config.iou_threshold());
        debug!("Model produced {} boxes after NMS", kept.len());
        Ok(kept)
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Suppress overlapping boxes, keeping the higher-confidence one.
fn nms(detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return vec![];
    }

    let mut sorted = detections;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; sorted.len()];

    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(sorted[i].clone());

        for j in (i + 1)..sorted.len() {
            if !suppressed[j] && iou(&sorted[i], &sorted[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    trace!("NMS kept {}/{} boxes", keep.len(), sorted.len());
    keep
}

/// Apply the response confidence threshold and resolve class ids to names.
///
/// The threshold boundary is inclusive: a detection scoring exactly the
/// threshold is kept. Input relative order is preserved, never sorted by
/// confidence.
///
/// # Panics
/// A class id outside the name table means the loaded model and its table
/// diverged; that is a programming error, not a request error.
pub fn filter_detections(
    detections: Vec<RawDetection>,
    threshold: f32,
    class_names: &[String],
) -> Vec<LabeledDetection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .map(|d| {
            let label = class_names.get(d.class_id).unwrap_or_else(|| {
                panic!(
                    "class id {} is not covered by the model name table ({} classes)",
                    d.class_id,
                    class_names.len()
                )
            });
            LabeledDetection {
                label: label.clone(),
                confidence: d.confidence,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(confidence: f32, class_id: usize) -> RawDetection {
        RawDetection {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence,
            class_id,
        }
    }

    fn names() -> Vec<String> {
        CLASS_NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let result = filter_detections(vec![raw(0.76, 0), raw(0.7599, 1)], 0.76, &names());

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].label, "5TL");
        assert_eq!(result[0].confidence, 0.76);
    }

    #[test]
    fn test_filter_preserves_input_order() {
        let result = filter_detections(
            vec![raw(0.8, 2), raw(0.95, 0), raw(0.9, 1)],
            0.76,
            &names(),
        );

        let labels: Vec<&str> = result.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["20TL", "5TL", "10TL"]);
    }

    #[test]
    fn test_filter_empty_when_all_below_threshold() {
        let result = filter_detections(vec![raw(0.5, 0), raw(0.75, 1)], 0.76, &names());
        assert!(result.is_empty());
    }

    #[test]
    #[should_panic(expected = "name table")]
    fn test_unknown_class_id_panics() {
        filter_detections(vec![raw(0.9, 42)], 0.5, &names());
    }

    #[test]
    fn test_iou_of_identical_boxes() {
        let a = raw(0.9, 0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_of_disjoint_boxes() {
        let a = raw(0.9, 0);
        let b = RawDetection {
            x1: 20.0,
            y1: 20.0,
            x2: 30.0,
            y2: 30.0,
            confidence: 0.8,
            class_id: 1,
        };
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlapping_boxes() {
        let a = raw(0.9, 0);
        let mut b = raw(0.8, 0);
        b.x1 = 1.0; // near-total overlap with a

        let kept = nms(vec![b, a], 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let a = raw(0.9, 0);
        let b = RawDetection {
            x1: 100.0,
            y1: 100.0,
            x2: 150.0,
            y2: 150.0,
            confidence: 0.8,
            class_id: 1,
        };

        let kept = nms(vec![a, b], 0.45);
        assert_eq!(kept.len(), 2);
    }
}
