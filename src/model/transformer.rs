//! Adapter for the attention-based (Transformer) model family.

use std::path::PathBuf;

use super::info::ModelInfo;
use super::runtime::InferenceRuntime;
use super::{ActionModel, ModelHandle, ModelKind, check_scores, window_tensor};
use crate::error::PredictError;
use crate::segment::Window;

/// The attention-based model behind the shared [`ActionModel`] capability.
///
/// The exported transformer graph emits raw logits, so this adapter owns the
/// softmax its artifact does not apply.
pub struct TransformerModel {
    runtime: Box<dyn InferenceRuntime>,
    handle: ModelHandle,
    class_names: Vec<String>,
}

impl TransformerModel {
    pub fn new(runtime: Box<dyn InferenceRuntime>, info: ModelInfo, model_path: PathBuf) -> Self {
        let handle = ModelHandle {
            name: ModelKind::Transformer.display_name().to_string(),
            accuracy: info.accuracy,
            input_shape: info.input_shape,
            num_classes: info.num_classes,
            model_path,
        };
        Self {
            runtime,
            handle,
            class_names: info.class_names,
        }
    }

    /// Action names declared by this artifact's info file.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

impl ActionModel for TransformerModel {
    fn predict(&self, window: &Window) -> Result<Vec<f32>, PredictError> {
        let input = window_tensor(window, &self.handle)?;
        let logits = self.runtime.run(input).map_err(PredictError::Inference)?;
        let logits = check_scores(logits, &self.handle)?;
        Ok(softmax(logits))
    }

    fn describe(&self) -> &ModelHandle {
        &self.handle
    }
}

/// Numerically stable softmax over the logit vector.
fn softmax(mut logits: Vec<f32>) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return logits;
    }
    let mut sum = 0.0_f32;
    for value in logits.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    if sum > 0.0 {
        for value in logits.iter_mut() {
            *value /= sum;
        }
    }
    logits
}
