//! Per-request orchestration: extract → segment → infer → rank.
//!
//! One pipeline instance serves one request. Windows may be scored in
//! parallel on a bounded worker pool, but results are reassembled into
//! segment order before anything is returned; the caller never observes
//! out-of-order or partial timelines. The first failure wins and aborts the
//! rest of the request.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::ClassCatalog;
use crate::config::PipelineSettings;
use crate::error::PredictError;
use crate::features::FeatureExtractor;
use crate::model::{ActionModel, ModelHandle};
use crate::rank::{self, RankedPrediction};
use crate::segment::{Segmenter, Window};

/// Stages a request passes through, in order; `Failed` is terminal from any
/// of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracting,
    Segmenting,
    Inferring,
    Ranking,
    Completed,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Extracting => "extracting",
            Stage::Segmenting => "segmenting",
            Stage::Inferring => "inferring",
            Stage::Ranking => "ranking",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

/// Cooperative cancellation handle shared with the caller.
///
/// Tripping the token abandons the request at the next window boundary;
/// in-flight adapter calls are allowed to finish and their results dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The completed response payload for one continuous request.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuousPrediction {
    pub video_duration: f64,
    pub num_predictions: usize,
    pub predictions: Vec<RankedPrediction>,
    pub model: ModelHandle,
}

/// Drives one video through the full pipeline against one selected model.
pub struct ContinuousPipeline<'a> {
    extractor: &'a dyn FeatureExtractor,
    model: &'a dyn ActionModel,
    catalog: &'a ClassCatalog,
    segmenter: Segmenter,
    top_k: usize,
    workers: usize,
    timeout: Option<Duration>,
}

impl<'a> ContinuousPipeline<'a> {
    pub fn new(
        extractor: &'a dyn FeatureExtractor,
        model: &'a dyn ActionModel,
        catalog: &'a ClassCatalog,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            model,
            catalog,
            segmenter: Segmenter::new(settings.window_seconds, settings.frames_per_window),
            top_k: settings.top_k,
            workers: settings.effective_workers(),
            timeout: settings.request_timeout(),
        }
    }

    /// Run the request to completion or its first error.
    pub fn run(&self, video: &[u8]) -> Result<ContinuousPrediction, PredictError> {
        self.run_with_cancel(video, &CancelToken::new())
    }

    /// Like [`run`](Self::run), but abandoned early once `cancel` trips.
    pub fn run_with_cancel(
        &self,
        video: &[u8],
        cancel: &CancelToken,
    ) -> Result<ContinuousPrediction, PredictError> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut stage = Stage::Received;
        match self.drive(video, cancel, deadline, &mut stage) {
            Ok(prediction) => Ok(prediction),
            Err(err) => {
                warn!(
                    stage = stage.name(),
                    kind = err.kind(),
                    "pipeline failed: {err}"
                );
                advance(&mut stage, Stage::Failed);
                Err(err)
            }
        }
    }

    fn drive(
        &self,
        video: &[u8],
        cancel: &CancelToken,
        deadline: Option<Instant>,
        stage: &mut Stage,
    ) -> Result<ContinuousPrediction, PredictError> {
        advance(stage, Stage::Extracting);
        let clip = self.extractor.extract(video)?;
        check_interrupt(cancel, deadline)?;

        advance(stage, Stage::Segmenting);
        let windows = self.segmenter.segment(&clip)?;
        debug!(
            windows = windows.len(),
            frames = clip.embeddings.len(),
            "clip segmented"
        );

        advance(stage, Stage::Inferring);
        let score_vectors = self.infer_windows(&windows, cancel, deadline)?;

        advance(stage, Stage::Ranking);
        let mut predictions = Vec::with_capacity(windows.len());
        for (window, scores) in windows.iter().zip(score_vectors) {
            predictions.push(rank::rank(&scores, self.catalog, self.top_k)?.at_segment(window));
        }

        advance(stage, Stage::Completed);
        let video_duration = if clip.duration_seconds > 0.0 {
            clip.duration_seconds
        } else {
            windows.last().map(|window| window.end_time).unwrap_or(0.0)
        };
        info!(
            model = %self.model.describe().name,
            segments = predictions.len(),
            duration = video_duration,
            "timeline completed"
        );
        Ok(ContinuousPrediction {
            video_duration,
            num_predictions: predictions.len(),
            predictions,
            model: self.model.describe().clone(),
        })
    }

    /// Score every window, in parallel when configured, preserving segment
    /// order in the returned vector.
    fn infer_windows(
        &self,
        windows: &[Window],
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Result<Vec<Vec<f32>>, PredictError> {
        let workers = self.workers.min(windows.len()).max(1);
        if workers == 1 {
            let mut out = Vec::with_capacity(windows.len());
            for window in windows {
                check_interrupt(cancel, deadline)?;
                out.push(self.model.predict(window)?);
                debug!(segment = window.segment_index, "window scored");
            }
            return Ok(out);
        }

        // Slot per segment index: workers claim ascending indices and write
        // results into their own slot, so reassembly is a plain in-order scan
        // with no contention on a growing list.
        let slots: Mutex<Vec<Option<Result<Vec<f32>, PredictError>>>> =
            Mutex::new((0..windows.len()).map(|_| None).collect());
        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if abort.load(Ordering::Relaxed) {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= windows.len() {
                            break;
                        }
                        if interrupted(cancel, deadline) {
                            abort.store(true, Ordering::Relaxed);
                            break;
                        }
                        let result = self.model.predict(&windows[index]);
                        if result.is_err() {
                            abort.store(true, Ordering::Relaxed);
                        }
                        let mut guard = slots.lock().unwrap_or_else(|err| err.into_inner());
                        guard[index] = Some(result);
                    }
                });
            }
        });

        let results = slots.into_inner().unwrap_or_else(|err| err.into_inner());
        let mut out = Vec::with_capacity(results.len());
        for slot in results {
            match slot {
                Some(Ok(scores)) => out.push(scores),
                // claims ascend, so the first faulty slot is the
                // lowest-indexed error of the whole batch
                Some(Err(err)) => return Err(err),
                None => return Err(PredictError::Timeout),
            }
        }
        Ok(out)
    }
}

fn advance(stage: &mut Stage, to: Stage) {
    debug!(from = stage.name(), to = to.name(), "stage transition");
    *stage = to;
}

fn interrupted(cancel: &CancelToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn check_interrupt(cancel: &CancelToken, deadline: Option<Instant>) -> Result<(), PredictError> {
    if interrupted(cancel, deadline) {
        return Err(PredictError::Timeout);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ClipFeatures, ExtractionError, FrameEmbedding, PrecomputedExtractor};
    use crate::model::testing::{FixedRuntime, test_info};
    use crate::model::{GruModel, TransformerModel};
    use std::path::PathBuf;

    const NAMES: &[&str] = &["plie", "tendu", "pirouette"];

    fn clip(duration_seconds: f64, fps: f64, features: usize) -> ClipFeatures {
        let frames = (duration_seconds * fps) as usize;
        ClipFeatures {
            frame_rate: fps,
            duration_seconds,
            embeddings: (0..frames)
                .map(|index| FrameEmbedding::new(vec![index as f32; features]))
                .collect(),
        }
    }

    fn settings() -> crate::config::PipelineSettings {
        crate::config::PipelineSettings {
            window_seconds: 10.0,
            frames_per_window: 10,
            feature_dim: 4,
            top_k: 5,
            worker_threads: 1,
            request_timeout_secs: 0,
        }
    }

    fn gru() -> GruModel {
        GruModel::new(
            Box::new(FixedRuntime {
                scores: vec![0.1, 0.7, 0.2],
            }),
            test_info(10, 4, NAMES),
            PathBuf::from("gru.onnx"),
        )
    }

    #[test]
    fn timeline_indexes_segments_chronologically() {
        let extractor = PrecomputedExtractor::new(clip(25.0, 30.0, 4));
        let model = gru();
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );
        let pipeline = ContinuousPipeline::new(&extractor, &model, &catalog, &settings());

        let response = pipeline.run(b"video").unwrap();
        assert_eq!(response.num_predictions, 3);
        assert_eq!(response.video_duration, 25.0);
        let starts: Vec<f64> = response
            .predictions
            .iter()
            .map(|prediction| prediction.start_time)
            .collect();
        assert_eq!(starts, vec![0.0, 10.0, 20.0]);
        for (index, prediction) in response.predictions.iter().enumerate() {
            assert_eq!(prediction.segment_index, index);
            assert_eq!(prediction.top_prediction.action_name, "tendu");
        }
    }

    #[test]
    fn extraction_failure_short_circuits_before_inference() {
        struct CorruptExtractor;
        impl crate::features::FeatureExtractor for CorruptExtractor {
            fn extract(&self, _video: &[u8]) -> Result<ClipFeatures, ExtractionError> {
                Err(ExtractionError::CorruptMedia {
                    reason: "truncated header".into(),
                })
            }
        }

        struct PanickyRuntime;
        impl crate::model::runtime::InferenceRuntime for PanickyRuntime {
            fn run(&self, _input: ndarray::Array3<f32>) -> Result<Vec<f32>, String> {
                panic!("inference must not run after a failed extraction");
            }
        }

        let extractor = CorruptExtractor;
        let model = GruModel::new(
            Box::new(PanickyRuntime),
            test_info(10, 4, NAMES),
            PathBuf::from("gru.onnx"),
        );
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );
        let pipeline = ContinuousPipeline::new(&extractor, &model, &catalog, &settings());

        let err = pipeline.run(b"garbage").unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
    }

    #[test]
    fn cancelled_request_yields_no_timeline() {
        let extractor = PrecomputedExtractor::new(clip(25.0, 30.0, 4));
        let model = gru();
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );
        let pipeline = ContinuousPipeline::new(&extractor, &model, &catalog, &settings());

        let token = CancelToken::new();
        token.cancel();
        let err = pipeline.run_with_cancel(b"video", &token).unwrap_err();
        assert!(matches!(err, PredictError::Timeout));
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let extractor = PrecomputedExtractor::new(clip(60.0, 24.0, 4));
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );

        // scores depend on the window contents so reordering would show up
        struct MeanRuntime;
        impl crate::model::runtime::InferenceRuntime for MeanRuntime {
            fn run(&self, input: ndarray::Array3<f32>) -> Result<Vec<f32>, String> {
                let mean = input.mean().unwrap_or(0.0);
                Ok(vec![mean, mean * 0.5, mean * 0.25])
            }
        }

        let run_with_workers = |workers: usize| {
            let model = GruModel::new(
                Box::new(MeanRuntime),
                test_info(10, 4, NAMES),
                PathBuf::from("gru.onnx"),
            );
            let mut options = settings();
            options.worker_threads = workers;
            ContinuousPipeline::new(&extractor, &model, &catalog, &options)
                .run(b"video")
                .unwrap()
        };

        let sequential = run_with_workers(1);
        let parallel = run_with_workers(4);
        assert_eq!(sequential.num_predictions, parallel.num_predictions);
        for (a, b) in sequential
            .predictions
            .iter()
            .zip(parallel.predictions.iter())
        {
            assert_eq!(a.segment_index, b.segment_index);
            assert_eq!(a.top_prediction.action_id, b.top_prediction.action_id);
            assert_eq!(a.top_prediction.confidence, b.top_prediction.confidence);
        }
    }

    #[test]
    fn first_error_in_segment_order_is_surfaced() {
        let extractor = PrecomputedExtractor::new(clip(50.0, 24.0, 4));
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );

        // every window after the first fails; the surfaced error must be the
        // lowest-indexed failure no matter the scheduling
        struct FlakyRuntime;
        impl crate::model::runtime::InferenceRuntime for FlakyRuntime {
            fn run(&self, input: ndarray::Array3<f32>) -> Result<Vec<f32>, String> {
                let first = input[[0, 0, 0]];
                if first == 0.0 {
                    Ok(vec![0.5, 0.3, 0.2])
                } else {
                    Err(format!("window starting at frame {first} failed"))
                }
            }
        }

        let model = GruModel::new(
            Box::new(FlakyRuntime),
            test_info(10, 4, NAMES),
            PathBuf::from("gru.onnx"),
        );
        let mut options = settings();
        options.worker_threads = 4;
        let pipeline = ContinuousPipeline::new(&extractor, &model, &catalog, &options);

        let err = pipeline.run(b"video").unwrap_err();
        match err {
            PredictError::Inference(message) => {
                // 50 s at 24 fps: segment 1 starts at frame 240
                assert!(message.contains("frame 240"), "got: {message}");
            }
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[test]
    fn switching_models_keeps_segment_boundaries() {
        let extractor = PrecomputedExtractor::new(clip(25.0, 30.0, 4));
        let catalog = crate::catalog::ClassCatalog::new(
            NAMES.iter().map(|name| name.to_string()).collect(),
        );
        let gru = gru();
        let transformer = TransformerModel::new(
            Box::new(FixedRuntime {
                scores: vec![2.0, 0.0, 1.0],
            }),
            test_info(10, 4, NAMES),
            PathBuf::from("transformer.onnx"),
        );

        let first = ContinuousPipeline::new(&extractor, &gru, &catalog, &settings())
            .run(b"video")
            .unwrap();
        let second = ContinuousPipeline::new(&extractor, &transformer, &catalog, &settings())
            .run(b"video")
            .unwrap();

        assert_eq!(first.num_predictions, second.num_predictions);
        for (a, b) in first.predictions.iter().zip(second.predictions.iter()) {
            assert_eq!(a.start_time, b.start_time);
            assert_eq!(a.end_time, b.end_time);
        }
        assert_eq!(first.predictions[0].top_prediction.action_name, "tendu");
        assert_eq!(second.predictions[0].top_prediction.action_name, "plie");
    }
}
