// Shared types for the detection-to-response pipeline

use serde::Serialize;

/// A single box produced by the detection model, before any response-level
/// filtering. Order is whatever the model emitted; callers must not assume
/// it is sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detector score in [0, 1]
    pub confidence: f32,
    /// Index into the model's class-name table
    pub class_id: usize,
}

/// A detection that passed the confidence threshold, with its class id
/// resolved to the model's class name.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDetection {
    pub label: String,
    pub confidence: f32,
}

/// One item of the `/detect` response.
///
/// `audio` is the base64-encoded synthesized speech for the localized label;
/// an empty string means synthesis failed for this item (never null).
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub label: String,
    #[serde(rename = "türkçe_etiket")]
    pub turkish_label: String,
    pub confidence: f32,
    pub audio: String,
}
