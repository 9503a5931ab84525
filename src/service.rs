//! Protocol-agnostic service facade.
//!
//! One instance owns the loaded models and the extractor and serves every
//! operation a transport layer would expose: continuous prediction, single
//! whole-video prediction, model metadata, comparison, class list, and a
//! liveness probe. All payloads serialize with `serde`; HTTP glue stays
//! outside this crate.

use std::path::PathBuf;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::app_dirs;
use crate::catalog::ClassCatalog;
use crate::config::{AppConfig, PipelineSettings};
use crate::error::PredictError;
use crate::features::{ClipFeatures, FeatureExtractor, FrameEmbedding};
use crate::model::{ActionModel, ModelHandle, ModelLoadError, ModelRegistry};
use crate::pipeline::{CancelToken, ContinuousPipeline, ContinuousPrediction};
use crate::rank::{self, RankedPrediction};
use crate::segment::{Segmenter, Window};

/// Errors raised while bringing the service up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    AppDir(#[from] app_dirs::AppDirError),
    #[error(transparent)]
    Models(#[from] ModelLoadError),
}

/// Single whole-video prediction, the one-shot counterpart of a timeline.
#[derive(Debug, Clone, Serialize)]
pub struct SinglePrediction {
    pub video_duration: f64,
    pub prediction: RankedPrediction,
    pub model: ModelHandle,
}

/// Display payload describing one loadable model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfoPayload {
    pub class_names: Vec<String>,
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    pub accuracy: f32,
    pub model_path: PathBuf,
}

/// One side of the accuracy comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub accuracy: f32,
    pub description: String,
}

/// Accuracy comparison of the two loaded models.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsComparison {
    pub gru: ModelSummary,
    pub transformer: ModelSummary,
    pub winner: String,
    pub difference: f32,
}

/// Per-model result of the liveness probe.
#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub name: String,
    pub ok: bool,
}

/// Liveness report with per-model self-checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub models: Vec<ModelHealth>,
}

/// Stable error payload for the boundary layer.
///
/// Only the kind and a human-readable summary cross the boundary; internal
/// detail stays in the logs.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: &'static str,
    pub message: String,
}

impl From<&PredictError> for ErrorPayload {
    fn from(err: &PredictError) -> Self {
        Self {
            error: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The anticipation service: loaded models, extractor, and pipeline knobs.
pub struct AnticipationService {
    registry: ModelRegistry,
    extractor: Box<dyn FeatureExtractor>,
    settings: PipelineSettings,
}

impl AnticipationService {
    pub fn new(
        registry: ModelRegistry,
        extractor: Box<dyn FeatureExtractor>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            extractor,
            settings,
        }
    }

    /// Load both models from the configured artifact paths and assemble the
    /// service around them.
    pub fn load(
        config: &AppConfig,
        extractor: Box<dyn FeatureExtractor>,
    ) -> Result<Self, StartupError> {
        let models_dir = app_dirs::models_dir()?;
        let registry = ModelRegistry::load(&config.models, &models_dir)?;
        Ok(Self::new(registry, extractor, config.pipeline.clone()))
    }

    /// Run the continuous pipeline over `video` with the selected model.
    pub fn predict_continuous(
        &self,
        video: &[u8],
        model_id: &str,
    ) -> Result<ContinuousPrediction, PredictError> {
        self.predict_continuous_with_cancel(video, model_id, &CancelToken::new())
    }

    /// Continuous prediction that can be abandoned through `cancel`.
    pub fn predict_continuous_with_cancel(
        &self,
        video: &[u8],
        model_id: &str,
        cancel: &CancelToken,
    ) -> Result<ContinuousPrediction, PredictError> {
        let model = self.registry.select_by_id(model_id)?;
        ContinuousPipeline::new(
            self.extractor.as_ref(),
            model,
            self.registry.catalog(),
            &self.settings,
        )
        .run_with_cancel(video, cancel)
    }

    /// One prediction for the whole upload: the clip collapses into a single
    /// window sampled across its full duration.
    pub fn predict_single(
        &self,
        video: &[u8],
        model_id: &str,
    ) -> Result<SinglePrediction, PredictError> {
        let model = self.registry.select_by_id(model_id)?;
        let clip = self.extractor.extract(video)?;
        let segmenter = Segmenter::new(self.settings.window_seconds, self.settings.frames_per_window);
        let window = segmenter.single_window(&clip)?;
        let scores = model.predict(&window)?;
        let prediction = rank::rank(&scores, self.registry.catalog(), self.settings.top_k)?
            .at_segment(&window);
        Ok(SinglePrediction {
            video_duration: window.end_time,
            prediction,
            model: model.describe().clone(),
        })
    }

    /// Display metadata for the selected model.
    pub fn model_info(&self, model_id: &str) -> Result<ModelInfoPayload, PredictError> {
        let model = self.registry.select_by_id(model_id)?;
        let handle = model.describe();
        Ok(ModelInfoPayload {
            class_names: self.registry.catalog().names().to_vec(),
            input_shape: handle.input_shape,
            num_classes: handle.num_classes,
            accuracy: handle.accuracy,
            model_path: handle.model_path.clone(),
        })
    }

    /// Side-by-side accuracy comparison of the two loaded models.
    pub fn models_comparison(&self) -> ModelsComparison {
        let [(_, gru), (_, transformer)] = self.registry.handles();
        let winner = if gru.accuracy >= transformer.accuracy {
            gru.name.clone()
        } else {
            transformer.name.clone()
        };
        ModelsComparison {
            gru: ModelSummary {
                name: gru.name.clone(),
                accuracy: gru.accuracy,
                description: "Recurrent network with sequential processing".to_string(),
            },
            transformer: ModelSummary {
                name: transformer.name.clone(),
                accuracy: transformer.accuracy,
                description: "Attention-based architecture with parallel processing".to_string(),
            },
            winner,
            difference: (gru.accuracy - transformer.accuracy).abs(),
        }
    }

    /// Action names in class-id order.
    pub fn class_names(&self) -> &[String] {
        self.registry.catalog().names()
    }

    pub fn catalog(&self) -> &ClassCatalog {
        self.registry.catalog()
    }

    /// Probe both models with a throwaway input of their declared shape.
    pub fn health(&self) -> HealthReport {
        let mut models = Vec::with_capacity(2);
        for (kind, handle) in self.registry.handles() {
            let ok = dummy_window(handle)
                .and_then(|window| self.registry.select(kind).predict(&window))
                .is_ok();
            models.push(ModelHealth {
                name: kind.display_name().to_string(),
                ok,
            });
        }
        let status = if models.iter().all(|model| model.ok) {
            "healthy"
        } else {
            "unhealthy"
        };
        HealthReport {
            status: status.to_string(),
            models,
        }
    }

    /// The model selected for `model_id`, mostly for tooling.
    pub fn select(&self, model_id: &str) -> Result<&dyn ActionModel, PredictError> {
        self.registry.select_by_id(model_id)
    }
}

/// A throwaway window of random embeddings matching the declared shape.
fn dummy_window(handle: &ModelHandle) -> Result<Window, PredictError> {
    let frames = handle.input_shape[1];
    let features = handle.input_shape[2];
    let mut rng = rand::rng();
    let clip = ClipFeatures {
        frame_rate: 1.0,
        duration_seconds: frames as f64,
        embeddings: (0..frames)
            .map(|_| FrameEmbedding::new((0..features).map(|_| rng.random::<f32>()).collect()))
            .collect(),
    };
    Segmenter::new(frames as f64, frames).single_window(&clip)
}
