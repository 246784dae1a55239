use std::path::PathBuf;

use thiserror::Error;

/// The input source could not be opened. Fatal before any processing starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("unable to open camera {index}; check the camera is connected: {reason}")]
    Camera { index: u32, reason: String },

    #[error("unable to open input file {}; check the file is readable: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("input {0} has no video stream")]
    NoVideoStream(PathBuf),
}

/// Failures loading or running an ONNX model.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to load model {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Run(String),

    #[error("unexpected output from {model}: expected {expected} values, got {actual}")]
    OutputShape {
        model: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("a landmark set needs exactly {expected} points, got {actual}")]
    PointCount { expected: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("two output channels share the display title {0:?}")]
    DuplicateTitle(String),
}

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("cannot create output file {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("failed to encode frame {index}: {reason}")]
    Append { index: u64, reason: String },

    #[error("failed to finalize output file {}: {reason}", path.display())]
    Finish { path: PathBuf, reason: String },
}
