//! Request-level error taxonomy for the anticipation pipeline.
//!
//! Every kind is terminal for the request that raised it: the pipeline never
//! retries internally, and a failed request yields no partial timeline.

use thiserror::Error;

use crate::features::ExtractionError;

/// Errors that can abort an inference request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The extractor yielded zero frames for the whole video.
    #[error("feature extraction produced no frames")]
    EmptyInput,
    /// A window or embedding does not match the model's declared input shape.
    #[error("model input dimension mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    /// The client asked for a model id the registry does not know.
    #[error("unknown model id '{0}' (expected \"gru\" or \"transformer\")")]
    UnknownModel(String),
    /// A probability vector does not line up with the class catalog.
    #[error("probability vector has {scores} entries for a catalog of {classes} classes")]
    CatalogMismatch { classes: usize, scores: usize },
    /// Feature extraction failed before any window was produced.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The underlying inference runtime reported a fault.
    #[error("inference failed: {0}")]
    Inference(String),
    /// The request deadline elapsed before the timeline completed.
    #[error("request deadline exceeded")]
    Timeout,
}

impl PredictError {
    /// Stable machine-readable kind, suitable for a response status field.
    ///
    /// The strings here are part of the external contract and must not change
    /// without versioning the boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::EmptyInput => "empty_input",
            PredictError::ShapeMismatch { .. } => "shape_mismatch",
            PredictError::UnknownModel(_) => "unknown_model",
            PredictError::CatalogMismatch { .. } => "catalog_mismatch",
            PredictError::Extraction(_) => "extraction_failed",
            PredictError::Inference(_) => "inference_failed",
            PredictError::Timeout => "timeout",
        }
    }
}
