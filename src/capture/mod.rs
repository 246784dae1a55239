mod file;
mod webcam;

pub use file::FileCapture;
pub use webcam::WebcamCapture;

use anyhow::Result;
use image::RgbImage;
use std::path::Path;

/// Trait for frame sources (live camera or recorded video)
pub trait CaptureSource {
    /// Capture the next frame, or `None` once the input is exhausted
    fn capture_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);

    /// Nominal frame rate reported by the source, 0.0 when unknown
    fn fps(&self) -> f64;
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).capture_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }

    fn fps(&self) -> f64 {
        (**self).fps()
    }
}

/// Open a video file when `input` is given, otherwise the camera at `camera_index`.
pub fn open_source(input: Option<&Path>, camera_index: u32) -> Result<Box<dyn CaptureSource>> {
    match input {
        Some(path) => Ok(Box::new(FileCapture::open(path)?)),
        None => Ok(Box::new(WebcamCapture::new(camera_index)?)),
    }
}
