//! The tensor-execution seam.
//!
//! The pipeline never looks inside a model artifact; it hands a fixed-shape
//! input to an [`InferenceRuntime`] and gets raw class scores back. The ONNX
//! Runtime binding below is the production implementation; tests substitute
//! their own.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array3;
use ort::session::Session;
use ort::session::builder::SessionBuilder;
use ort::session::output::SessionOutputs;
use ort::value::Tensor;

/// Evaluates one `[1, time, features]` input tensor to a flat score vector.
///
/// Implementations must tolerate concurrent calls; the orchestrator may
/// evaluate several windows at once against the same runtime.
pub trait InferenceRuntime: Send + Sync {
    fn run(&self, input: Array3<f32>) -> Result<Vec<f32>, String>;
}

/// An ONNX Runtime session wrapping one model artifact.
pub struct OnnxSession {
    session: Mutex<Session>,
}

impl OnnxSession {
    /// Load the artifact at `model_path` into a new session.
    pub fn load(model_path: &Path) -> Result<Self, String> {
        if !model_path.exists() {
            return Err(format!(
                "ONNX model not found at {}",
                model_path.to_string_lossy()
            ));
        }
        let session = SessionBuilder::new()
            .map_err(|err| format!("Failed to create ONNX session builder: {err}"))?
            .with_intra_threads(
                std::thread::available_parallelism()
                    .map(|n| n.get().saturating_sub(1).max(1))
                    .unwrap_or(1),
            )
            .map_err(|err| format!("Failed to set ONNX threads: {err}"))?
            .commit_from_file(model_path)
            .map_err(|err| format!("Failed to load ONNX model: {err}"))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl InferenceRuntime for OnnxSession {
    fn run(&self, input: Array3<f32>) -> Result<Vec<f32>, String> {
        let input_value = Tensor::from_array(input)
            .map_err(|err| format!("Failed to create ONNX input tensor: {err}"))?;
        let mut session = self
            .session
            .lock()
            .map_err(|err| format!("ONNX session lock poisoned: {err}"))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|err| format!("ONNX inference failed: {err}"))?;
        extract_scores(&outputs)
    }
}

/// Pull the first batch row out of the session's score output.
fn extract_scores(outputs: &SessionOutputs) -> Result<Vec<f32>, String> {
    for value in outputs.values() {
        let array = value
            .try_extract_array::<f32>()
            .map_err(|err| format!("Failed to read ONNX output tensor: {err}"))?;
        let shape = array.shape().to_vec();
        let flat = array
            .as_slice()
            .ok_or_else(|| "ONNX output tensor not contiguous".to_string())?;
        if flat.is_empty() {
            continue;
        }
        let row_len = *shape.last().unwrap_or(&flat.len());
        if row_len == 0 || flat.len() < row_len {
            continue;
        }
        return Ok(flat[..row_len].to_vec());
    }
    Err("No score output found in ONNX outputs".to_string())
}
