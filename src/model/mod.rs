//! Uniform interface over the two trained sequence models.
//!
//! Both artifacts consume identically-shaped windows and score the same
//! class catalog; everything family-specific lives behind [`ActionModel`].
//! Selection is a pure lookup over models loaded once at startup.

pub mod info;
pub mod runtime;

mod gru;
mod transformer;

pub use gru::GruModel;
pub use transformer::TransformerModel;

use std::path::Path;
use std::path::PathBuf;

use ndarray::Array3;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::ClassCatalog;
use crate::config::ModelSettings;
use crate::error::PredictError;
use crate::segment::Window;
use info::ModelInfoError;
use runtime::OnnxSession;

/// The two interchangeable model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Gru,
    Transformer,
}

impl ModelKind {
    /// Strict mapping from a client-supplied id; unknown ids are an error,
    /// never a silent default.
    pub fn from_id(id: &str) -> Result<Self, PredictError> {
        match id.trim().to_ascii_lowercase().as_str() {
            "gru" => Ok(ModelKind::Gru),
            "transformer" => Ok(ModelKind::Transformer),
            _ => Err(PredictError::UnknownModel(id.to_string())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::Gru => "gru",
            ModelKind::Transformer => "transformer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Gru => "GRU",
            ModelKind::Transformer => "Transformer",
        }
    }
}

/// Declared metadata of a loaded model, exposed verbatim for display.
#[derive(Debug, Clone, Serialize)]
pub struct ModelHandle {
    pub name: String,
    pub accuracy: f32,
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    pub model_path: PathBuf,
}

/// Capability shared by both model families.
pub trait ActionModel: Send + Sync {
    /// Score one window. The result has `describe().num_classes` entries;
    /// callers get whatever scale the model produces, normalized only where
    /// the artifact itself does not normalize.
    fn predict(&self, window: &Window) -> Result<Vec<f32>, PredictError>;

    /// The model's declared metadata.
    fn describe(&self) -> &ModelHandle;
}

/// Validate a window against the declared shape and lay it out as
/// `[1, time, features]` for the runtime.
pub(crate) fn window_tensor(
    window: &Window,
    handle: &ModelHandle,
) -> Result<Array3<f32>, PredictError> {
    let frames = handle.input_shape[1];
    let features = handle.input_shape[2];
    if window.frame_count() != frames {
        return Err(PredictError::ShapeMismatch {
            expected: frames,
            got: window.frame_count(),
        });
    }
    let mut data = Vec::with_capacity(frames * features);
    for embedding in window.embeddings() {
        if embedding.dim() != features {
            return Err(PredictError::ShapeMismatch {
                expected: features,
                got: embedding.dim(),
            });
        }
        data.extend_from_slice(embedding.as_slice());
    }
    Array3::from_shape_vec((1, frames, features), data)
        .map_err(|err| PredictError::Inference(format!("failed to shape model input: {err}")))
}

/// Check a runtime's score vector against the declared class count.
pub(crate) fn check_scores(
    scores: Vec<f32>,
    handle: &ModelHandle,
) -> Result<Vec<f32>, PredictError> {
    if scores.len() != handle.num_classes {
        return Err(PredictError::Inference(format!(
            "model returned {} scores for {} declared classes",
            scores.len(),
            handle.num_classes
        )));
    }
    Ok(scores)
}

/// Errors raised while bringing the registry up at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error(transparent)]
    Info(#[from] ModelInfoError),
    #[error("Failed to load {kind} model session: {reason}")]
    Session { kind: &'static str, reason: String },
    #[error("The two models declare different class catalogs")]
    CatalogDivergence,
}

/// Both loaded models plus their shared catalog.
///
/// Built once at startup, then read-only; many in-flight requests may select
/// from it concurrently without locking.
pub struct ModelRegistry {
    gru: GruModel,
    transformer: TransformerModel,
    catalog: ClassCatalog,
}

impl ModelRegistry {
    /// Load both models from their configured artifact paths.
    pub fn load(settings: &ModelSettings, models_dir: &Path) -> Result<Self, ModelLoadError> {
        let gru = {
            let info = info::load(&settings.gru.info_path(models_dir))?;
            let path = settings.gru.model_path(models_dir);
            let session =
                OnnxSession::load(&path).map_err(|reason| ModelLoadError::Session {
                    kind: ModelKind::Gru.id(),
                    reason,
                })?;
            GruModel::new(Box::new(session), info, path)
        };
        let transformer = {
            let info = info::load(&settings.transformer.info_path(models_dir))?;
            let path = settings.transformer.model_path(models_dir);
            let session =
                OnnxSession::load(&path).map_err(|reason| ModelLoadError::Session {
                    kind: ModelKind::Transformer.id(),
                    reason,
                })?;
            TransformerModel::new(Box::new(session), info, path)
        };
        Self::from_parts(gru, transformer)
    }

    /// Assemble a registry from already-built adapters.
    ///
    /// Rejects adapters whose declared class lists disagree; the catalog is
    /// shared by contract.
    pub fn from_parts(
        gru: GruModel,
        transformer: TransformerModel,
    ) -> Result<Self, ModelLoadError> {
        if gru.class_names() != transformer.class_names() {
            return Err(ModelLoadError::CatalogDivergence);
        }
        let catalog = ClassCatalog::new(gru.class_names().to_vec());
        Ok(Self {
            gru,
            transformer,
            catalog,
        })
    }

    /// Pure selection of an already-loaded adapter; never a reload.
    pub fn select(&self, kind: ModelKind) -> &dyn ActionModel {
        match kind {
            ModelKind::Gru => &self.gru,
            ModelKind::Transformer => &self.transformer,
        }
    }

    /// Selection straight from a client-supplied id.
    pub fn select_by_id(&self, id: &str) -> Result<&dyn ActionModel, PredictError> {
        Ok(self.select(ModelKind::from_id(id)?))
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    /// Handles of every loaded model, in a stable order.
    pub fn handles(&self) -> [(ModelKind, &ModelHandle); 2] {
        [
            (ModelKind::Gru, self.gru.describe()),
            (ModelKind::Transformer, self.transformer.describe()),
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedRuntime, test_info, test_window};
    use super::*;

    const NAMES: &[&str] = &["plie", "tendu", "pirouette"];

    fn registry() -> ModelRegistry {
        let gru = GruModel::new(
            Box::new(FixedRuntime {
                scores: vec![0.1, 0.7, 0.2],
            }),
            test_info(4, 8, NAMES),
            PathBuf::from("gru.onnx"),
        );
        let transformer = TransformerModel::new(
            Box::new(FixedRuntime {
                scores: vec![0.0, 1.0, 2.0],
            }),
            test_info(4, 8, NAMES),
            PathBuf::from("transformer.onnx"),
        );
        ModelRegistry::from_parts(gru, transformer).unwrap()
    }

    #[test]
    fn model_ids_resolve_strictly() {
        assert_eq!(ModelKind::from_id("gru").unwrap(), ModelKind::Gru);
        assert_eq!(
            ModelKind::from_id(" Transformer ").unwrap(),
            ModelKind::Transformer
        );
        assert!(matches!(
            ModelKind::from_id("lstm"),
            Err(PredictError::UnknownModel(id)) if id == "lstm"
        ));
    }

    #[test]
    fn selection_never_defaults() {
        let registry = registry();
        assert!(registry.select_by_id("gru").is_ok());
        assert!(matches!(
            registry.select_by_id("best"),
            Err(PredictError::UnknownModel(_))
        ));
    }

    #[test]
    fn diverging_catalogs_are_rejected() {
        let gru = GruModel::new(
            Box::new(FixedRuntime {
                scores: vec![0.5, 0.5],
            }),
            test_info(4, 8, &["plie", "tendu"]),
            PathBuf::from("gru.onnx"),
        );
        let transformer = TransformerModel::new(
            Box::new(FixedRuntime {
                scores: vec![0.5, 0.5],
            }),
            test_info(4, 8, &["plie", "fondu"]),
            PathBuf::from("transformer.onnx"),
        );
        assert!(matches!(
            ModelRegistry::from_parts(gru, transformer),
            Err(ModelLoadError::CatalogDivergence)
        ));
    }

    #[test]
    fn window_tensor_rejects_wrong_time_dimension() {
        let registry = registry();
        let handle = registry.select(ModelKind::Gru).describe();
        let window = test_window(3, 8);
        assert!(matches!(
            window_tensor(&window, handle),
            Err(PredictError::ShapeMismatch {
                expected: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn window_tensor_rejects_wrong_feature_dimension() {
        let registry = registry();
        let handle = registry.select(ModelKind::Gru).describe();
        let window = test_window(4, 5);
        assert!(matches!(
            window_tensor(&window, handle),
            Err(PredictError::ShapeMismatch {
                expected: 8,
                got: 5
            })
        ));
    }

    #[test]
    fn both_handles_are_listed() {
        let registry = registry();
        let [gru, transformer] = registry.handles();
        assert_eq!(gru.0, ModelKind::Gru);
        assert_eq!(gru.1.name, "GRU");
        assert_eq!(transformer.1.name, "Transformer");
        assert_eq!(registry.catalog().len(), 3);
    }
}
