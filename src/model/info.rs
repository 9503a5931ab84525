//! Sidecar metadata shipped next to each model artifact.
//!
//! The training pipeline exports a small JSON file per artifact describing
//! the classes, expected input shape, and held-out accuracy. The runtime
//! never inspects the artifact itself; this file is the source of truth for
//! its declared shapes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or validating a model info file.
#[derive(Debug, Error)]
pub enum ModelInfoError {
    #[error("Failed to read model info {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse model info {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(
        "Model info {path} is inconsistent: {class_names} class names for num_classes={num_classes}"
    )]
    ClassCountMismatch {
        path: PathBuf,
        class_names: usize,
        num_classes: usize,
    },
    #[error("Model info {path} declares a zero-sized input shape {shape:?}")]
    DegenerateShape { path: PathBuf, shape: [usize; 3] },
}

/// Declared metadata for one trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Action names in class-id order.
    pub class_names: Vec<String>,
    /// `[batch, time, features]`, batch always 1.
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    /// Held-out accuracy in percent, as reported by training.
    #[serde(default)]
    pub accuracy: f32,
}

impl ModelInfo {
    /// Time dimension the model expects per window.
    pub fn frames_per_window(&self) -> usize {
        self.input_shape[1]
    }

    /// Feature channels the model expects per embedding.
    pub fn feature_dim(&self) -> usize {
        self.input_shape[2]
    }
}

/// Load and validate a model info file.
pub fn load(path: &Path) -> Result<ModelInfo, ModelInfoError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelInfoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let info: ModelInfo = serde_json::from_str(&text).map_err(|source| ModelInfoError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if info.class_names.len() != info.num_classes {
        return Err(ModelInfoError::ClassCountMismatch {
            path: path.to_path_buf(),
            class_names: info.class_names.len(),
            num_classes: info.num_classes,
        });
    }
    if info.input_shape.iter().any(|dim| *dim == 0) {
        return Err(ModelInfoError::DegenerateShape {
            path: path.to_path_buf(),
            shape: info.input_shape,
        });
    }
    Ok(info)
}
