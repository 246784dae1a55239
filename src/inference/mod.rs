mod preprocess;

pub use preprocess::Preprocessor;

use crate::error::InferenceError;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::fmt::Display;
use std::path::Path;

/// Load an ONNX model into an ONNX Runtime session
pub fn load_session(model_path: &Path) -> Result<Session, InferenceError> {
    tracing::info!("Loading model from {}", model_path.display());

    let session = Session::builder()
        .map_err(|e| load_failure(model_path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_failure(model_path, e))?
        .with_intra_threads(4)
        .map_err(|e| load_failure(model_path, e))?
        .commit_from_file(model_path)
        .map_err(|e| load_failure(model_path, e))?;

    tracing::info!("Model {} loaded", model_path.display());
    Ok(session)
}

fn load_failure(path: &Path, reason: impl Display) -> InferenceError {
    InferenceError::Load {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
