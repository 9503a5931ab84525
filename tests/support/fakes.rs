#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ndarray::Array3;

use entrechat::config::PipelineSettings;
use entrechat::features::{ClipFeatures, ExtractionError, FeatureExtractor, FrameEmbedding};
use entrechat::model::info::ModelInfo;
use entrechat::model::runtime::InferenceRuntime;
use entrechat::model::{GruModel, ModelRegistry, TransformerModel};

/// The eleven ballet actions, in class-id order as the training export
/// writes them.
pub const CLASS_NAMES: &[&str] = &[
    "arabesque",
    "attitude",
    "chasse",
    "fondu",
    "fouette",
    "grand_battement",
    "pirouette",
    "plie",
    "releve",
    "saute",
    "tendu",
];

pub const FRAMES_PER_WINDOW: usize = 10;
pub const FEATURE_DIM: usize = 16;

pub fn class_names() -> Vec<String> {
    CLASS_NAMES.iter().map(|name| name.to_string()).collect()
}

pub fn clip(duration_seconds: f64, fps: f64) -> ClipFeatures {
    let frames = (duration_seconds * fps) as usize;
    ClipFeatures {
        frame_rate: fps,
        duration_seconds,
        embeddings: (0..frames)
            .map(|index| FrameEmbedding::new(vec![index as f32; FEATURE_DIM]))
            .collect(),
    }
}

pub fn model_info(accuracy: f32) -> ModelInfo {
    ModelInfo {
        class_names: class_names(),
        input_shape: [1, FRAMES_PER_WINDOW, FEATURE_DIM],
        num_classes: CLASS_NAMES.len(),
        accuracy,
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        window_seconds: 10.0,
        frames_per_window: FRAMES_PER_WINDOW,
        feature_dim: FEATURE_DIM,
        top_k: 5,
        worker_threads: 1,
        request_timeout_secs: 0,
    }
}

/// Deterministic runtime whose scores depend on the window contents, so
/// every segment ranks differently and reordering would be visible.
pub struct WindowMeanRuntime {
    pub classes: usize,
    pub calls: Arc<AtomicUsize>,
}

impl WindowMeanRuntime {
    pub fn new(classes: usize) -> Self {
        Self {
            classes,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InferenceRuntime for WindowMeanRuntime {
    fn run(&self, input: Array3<f32>) -> Result<Vec<f32>, String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mean = input.mean().unwrap_or(0.0);
        Ok((0..self.classes)
            .map(|id| ((mean + 1.0) * (id as f32 + 1.0)).sin() + 1.0)
            .collect())
    }
}

/// Runtime that takes a fixed pause per window before answering.
pub struct SlowRuntime {
    pub classes: usize,
    pub pause: Duration,
}

impl InferenceRuntime for SlowRuntime {
    fn run(&self, _input: Array3<f32>) -> Result<Vec<f32>, String> {
        std::thread::sleep(self.pause);
        Ok(vec![1.0; self.classes])
    }
}

/// Extractor that always reports corrupt media.
pub struct CorruptExtractor;

impl FeatureExtractor for CorruptExtractor {
    fn extract(&self, _video: &[u8]) -> Result<ClipFeatures, ExtractionError> {
        Err(ExtractionError::CorruptMedia {
            reason: "truncated container header".into(),
        })
    }
}

/// Registry over two content-sensitive fake runtimes, with call counters.
pub struct FakeModels {
    pub registry: ModelRegistry,
    pub gru_calls: Arc<AtomicUsize>,
    pub transformer_calls: Arc<AtomicUsize>,
}

pub fn fake_models() -> FakeModels {
    let gru_runtime = WindowMeanRuntime::new(CLASS_NAMES.len());
    let transformer_runtime = WindowMeanRuntime::new(CLASS_NAMES.len());
    let gru_calls = Arc::clone(&gru_runtime.calls);
    let transformer_calls = Arc::clone(&transformer_runtime.calls);
    let registry = ModelRegistry::from_parts(
        GruModel::new(
            Box::new(gru_runtime),
            model_info(72.5),
            PathBuf::from("models/action_gru.onnx"),
        ),
        TransformerModel::new(
            Box::new(transformer_runtime),
            model_info(64.2),
            PathBuf::from("models/action_transformer.onnx"),
        ),
    )
    .expect("fake registry");
    FakeModels {
        registry,
        gru_calls,
        transformer_calls,
    }
}
