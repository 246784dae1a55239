use image::{imageops, RgbImage};
use ndarray::Array4;

/// Converts RGB images into normalized NCHW model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    mean: f32,
    scale: f32,
}

impl Preprocessor {
    /// Preprocessor producing values in [0, 1]
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mean: 0.0,
            scale: 1.0 / 255.0,
        }
    }

    /// Use `(value - mean) * scale` instead of the default [0, 1] range
    pub fn with_normalization(mut self, mean: f32, scale: f32) -> Self {
        self.mean = mean;
        self.scale = scale;
        self
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Normalize each channel with the configured mean and scale
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - self.mean) * self.scale;
            }
        }

        tensor
    }
}
