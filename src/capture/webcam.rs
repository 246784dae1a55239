use super::CaptureSource;
use crate::error::InputError;
use anyhow::Result;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
    fps: f64,
}

impl WebcamCapture {
    pub fn new(device_index: u32) -> Result<Self> {
        tracing::info!("Initializing webcam {}", device_index);

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested).map_err(|e| InputError::Camera {
            index: device_index,
            reason: e.to_string(),
        })?;

        camera.open_stream().map_err(|e| InputError::Camera {
            index: device_index,
            reason: e.to_string(),
        })?;

        let resolution = camera.resolution();
        let fps = camera.frame_rate() as f64;

        tracing::info!(
            "Webcam initialized at {}x{} ({} fps)",
            resolution.width(),
            resolution.height(),
            fps
        );

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
            fps,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        // A camera that stops delivering frames has been disconnected.
        let frame = match self.camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Camera stopped delivering frames: {}", e);
                return Ok(None);
            }
        };

        match frame.decode_image::<RgbFormat>() {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                tracing::warn!("Failed to decode camera frame: {}", e);
                Ok(None)
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::debug!("Failed to stop camera stream: {}", e);
        }
    }
}
