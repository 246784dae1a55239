use super::{FaceDetector, Rect};
use crate::error::InferenceError;
use crate::inference::{self, Preprocessor};
use anyhow::Result;
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// UltraFace (RFB-320) input resolution.
const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

/// Default face confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.7;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Lightweight frontal face detector backed by an ONNX Runtime session.
///
/// The model emits per-anchor `[background, face]` scores and corner-form boxes
/// normalized to the input size. Only the largest face survives, so the mirror
/// follows the most prominent person in view.
pub struct UltraFaceDetector {
    session: Session,
    preprocessor: Preprocessor,
    confidence: f32,
}

impl UltraFaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = inference::load_session(model_path.as_ref())?;
        let preprocessor =
            Preprocessor::new(INPUT_WIDTH, INPUT_HEIGHT).with_normalization(127.0, 1.0 / 128.0);

        Ok(Self {
            session,
            preprocessor,
            confidence: DEFAULT_CONFIDENCE,
        })
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Rect>> {
        let _span = tracing::debug_span!("ultraface_detect").entered();

        let input = self.preprocessor.preprocess(frame);
        let input = Tensor::from_array(input).map_err(|e| InferenceError::Run(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        if outputs.len() < 2 {
            return Err(InferenceError::OutputShape {
                model: "UltraFace",
                expected: 2,
                actual: outputs.len(),
            }
            .into());
        }

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Run(e.to_string()))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let candidates = decode_candidates(scores, boxes, self.confidence)?;
        let kept = nms(candidates, NMS_IOU_THRESH);

        Ok(largest(&kept).and_then(|face| face.to_frame_rect(frame.width(), frame.height())))
    }
}

/// Candidate face in input-normalized corner coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FaceBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &FaceBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Scale to frame pixels, clamped to the frame. `None` if nothing is left.
    fn to_frame_rect(&self, width: u32, height: u32) -> Option<Rect> {
        let (w, h) = (width as f32, height as f32);
        let x1 = (self.x1 * w).clamp(0.0, w);
        let y1 = (self.y1 * h).clamp(0.0, h);
        let x2 = (self.x2 * w).clamp(0.0, w);
        let y2 = (self.y2 * h).clamp(0.0, h);

        let rect_w = (x2 - x1).round() as u32;
        let rect_h = (y2 - y1).round() as u32;
        if rect_w == 0 || rect_h == 0 {
            return None;
        }
        Some(Rect::at(x1.round() as i32, y1.round() as i32).of_size(rect_w, rect_h))
    }
}

fn decode_candidates(scores: &[f32], boxes: &[f32], confidence: f32) -> Result<Vec<FaceBox>> {
    let anchors = scores.len() / 2;
    if boxes.len() != anchors * 4 {
        return Err(InferenceError::OutputShape {
            model: "UltraFace",
            expected: anchors * 4,
            actual: boxes.len(),
        }
        .into());
    }

    Ok((0..anchors)
        .filter_map(|i| {
            let score = scores[i * 2 + 1];
            if score < confidence {
                return None;
            }
            let b = &boxes[i * 4..i * 4 + 4];
            Some(FaceBox {
                x1: b[0],
                y1: b[1],
                x2: b[2],
                y2: b[3],
                score,
            })
        })
        .collect())
}

fn nms(mut candidates: Vec<FaceBox>, iou_thresh: f32) -> Vec<FaceBox> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| k.iou(&candidate) <= iou_thresh) {
            keep.push(candidate);
        }
    }
    keep
}

fn largest(faces: &[FaceBox]) -> Option<FaceBox> {
    faces
        .iter()
        .copied()
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap_or(std::cmp::Ordering::Equal))
}
