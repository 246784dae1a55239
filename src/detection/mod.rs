mod locator;
mod ultraface;

pub use imageproc::rect::Rect;
pub use locator::FaceLocator;
pub use ultraface::UltraFaceDetector;

use anyhow::Result;
use image::RgbImage;

/// Per-frame face presence: the bounding box only exists when a face was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detection {
    Absent,
    Found(Rect),
}

impl Detection {
    pub fn face(&self) -> Option<Rect> {
        match *self {
            Detection::Found(rect) => Some(rect),
            Detection::Absent => None,
        }
    }
}

impl From<Option<Rect>> for Detection {
    fn from(face: Option<Rect>) -> Self {
        face.map_or(Detection::Absent, Detection::Found)
    }
}

/// Trait for frontal face detectors
/// Allows swapping the model backing the locator
pub trait FaceDetector {
    /// Find the most prominent face in the frame, if any
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Rect>>;
}
