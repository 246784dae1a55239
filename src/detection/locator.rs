use super::{Detection, FaceDetector};
use crate::capture::CaptureSource;
use anyhow::Result;
use image::RgbImage;

/// Pairs a capture source with a face detector.
///
/// Detection can be throttled to every `detect_every` frames; in between, the
/// freshest frame is returned with the most recently computed detection.
pub struct FaceLocator<C> {
    capture: C,
    detector: Box<dyn FaceDetector>,
    detect_every: u32,
    frames_until_detect: u32,
    latest: Detection,
}

impl<C: CaptureSource> FaceLocator<C> {
    pub fn new(capture: C, detector: Box<dyn FaceDetector>, detect_every: u32) -> Self {
        Self {
            capture,
            detector,
            detect_every: detect_every.max(1),
            frames_until_detect: 0,
            latest: Detection::Absent,
        }
    }

    /// Next frame and its detection state, or `None` at end of input.
    ///
    /// An empty frame counts as end of input.
    pub fn next_frame(&mut self) -> Result<Option<(RgbImage, Detection)>> {
        let Some(frame) = self.capture.capture_frame()? else {
            return Ok(None);
        };
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(None);
        }

        if self.frames_until_detect == 0 {
            self.latest = match self.detector.detect(&frame) {
                Ok(face) => Detection::from(face),
                Err(e) => {
                    tracing::warn!("Face detection failed, treating frame as faceless: {:#}", e);
                    Detection::Absent
                }
            };
            self.frames_until_detect = self.detect_every;
            tracing::debug!("Detection: {:?}", self.latest);
        }
        self.frames_until_detect -= 1;

        Ok(Some((frame, self.latest)))
    }

    /// Advance past one frame without running detection.
    ///
    /// Returns false at end of input.
    pub fn skip(&mut self) -> Result<bool> {
        Ok(self
            .capture
            .capture_frame()?
            .is_some_and(|frame| frame.width() > 0 && frame.height() > 0))
    }
}
