mod channel;
mod encoder;
pub mod mirror;
mod window;

pub use channel::{OutputChannel, Reflection};
pub use encoder::{EncoderSettings, FfmpegEncoder, VideoCodec};
pub use window::WindowSurface;

use crate::controls::KeyPress;
use anyhow::Result;
use image::RgbImage;

/// Trait for live display destinations
pub trait DisplaySurface {
    /// Show a frame
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// Keys pressed since the last poll
    fn poll_keys(&mut self) -> Vec<KeyPress>;

    /// Whether a window is currently open to receive key presses
    fn is_open(&self) -> bool;
}

/// Trait for encoded video file destinations
pub trait VideoEncoder {
    /// Append a frame to the file
    fn append(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush pending packets and finalize the container; safe to call twice
    fn finish(&mut self) -> Result<()>;
}
