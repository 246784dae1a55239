use super::{LandmarkEstimator, LandmarkSet, Point, LANDMARK_COUNT};
use crate::detection::Rect;
use crate::error::InferenceError;
use crate::inference::{self, Preprocessor};
use anyhow::{bail, Result};
use image::{imageops, RgbImage};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Model input resolution (square).
const INPUT_SIZE: u32 = 112;

/// Fraction the face box is enlarged by before cropping.
const CROP_MARGIN: f32 = 0.1;

/// 68-point landmark regressor (PFLD-style ONNX model).
///
/// Input is a `[1, 3, 112, 112]` RGB crop in [0, 1]; output is 136 values,
/// `(x, y)` pairs normalized to the crop.
pub struct PfldLandmarkEstimator {
    session: Session,
    preprocessor: Preprocessor,
}

impl PfldLandmarkEstimator {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = inference::load_session(model_path.as_ref())?;
        Ok(Self {
            session,
            preprocessor: Preprocessor::new(INPUT_SIZE, INPUT_SIZE),
        })
    }
}

impl LandmarkEstimator for PfldLandmarkEstimator {
    fn estimate(&mut self, frame: &RgbImage, face: Rect) -> Result<LandmarkSet> {
        let _span = tracing::debug_span!("landmarks").entered();

        let Some(crop) = CropWindow::around(face, frame.width(), frame.height()) else {
            bail!("face box {:?} lies outside the frame", face);
        };

        let patch = imageops::crop_imm(frame, crop.x, crop.y, crop.width, crop.height).to_image();
        let input = self.preprocessor.preprocess(&patch);
        let input = Tensor::from_array(input).map_err(|e| InferenceError::Run(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let (_, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        if values.len() != LANDMARK_COUNT * 2 {
            return Err(InferenceError::OutputShape {
                model: "PFLD",
                expected: LANDMARK_COUNT * 2,
                actual: values.len(),
            }
            .into());
        }

        Ok(LandmarkSet::new(crop.to_frame_points(values))?)
    }
}

/// Region of the frame fed to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CropWindow {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropWindow {
    /// Square window centred on the face, enlarged by the margin and clamped
    /// to the frame. `None` if the clamped window is empty.
    fn around(face: Rect, frame_width: u32, frame_height: u32) -> Option<Self> {
        let side = face.width().max(face.height()) as f32 * (1.0 + CROP_MARGIN);
        let cx = face.left() as f32 + face.width() as f32 / 2.0;
        let cy = face.top() as f32 + face.height() as f32 / 2.0;

        let x0 = (cx - side / 2.0).round().clamp(0.0, frame_width as f32) as u32;
        let y0 = (cy - side / 2.0).round().clamp(0.0, frame_height as f32) as u32;
        let x1 = (cx + side / 2.0).round().clamp(0.0, frame_width as f32) as u32;
        let y1 = (cy + side / 2.0).round().clamp(0.0, frame_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    fn to_frame_points(&self, normalized: &[f32]) -> Vec<Point> {
        normalized
            .chunks_exact(2)
            .map(|xy| {
                Point::new(
                    (self.x as f32 + xy[0] * self.width as f32).round() as i32,
                    (self.y as f32 + xy[1] * self.height as f32).round() as i32,
                )
            })
            .collect()
    }
}
