//! Adapter for the recurrent (GRU) model family.

use std::path::PathBuf;

use super::info::ModelInfo;
use super::runtime::InferenceRuntime;
use super::{ActionModel, ModelHandle, ModelKind, check_scores, window_tensor};
use crate::error::PredictError;
use crate::segment::Window;

/// The recurrent model behind the shared [`ActionModel`] capability.
///
/// The exported GRU graph ends in a softmax layer, so its scores pass
/// through unchanged.
pub struct GruModel {
    runtime: Box<dyn InferenceRuntime>,
    handle: ModelHandle,
    class_names: Vec<String>,
}

impl GruModel {
    pub fn new(runtime: Box<dyn InferenceRuntime>, info: ModelInfo, model_path: PathBuf) -> Self {
        let handle = ModelHandle {
            name: ModelKind::Gru.display_name().to_string(),
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

impl ActionModel for GruModel {
    fn predict(&self, window: &Window) -> Result<Vec<f32>, PredictError> {
        let input = window_tensor(window, &self.handle)?;
        let scores = self.runtime.run(input).map_err(PredictError::Inference)?;
        check_scores(scores, &self.handle)
    }

    fn describe(&self) -> &ModelHandle {
        &self.handle
    }
}
