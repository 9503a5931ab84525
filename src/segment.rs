//! Fixed-duration windowing over a clip's frame embeddings.
//!
//! Every window carries exactly `frames_per_window` embeddings regardless of
//! how many source frames its time span holds: dense spans are sampled at
//! evenly spaced indices, sparse spans repeat their last embedding. Windows
//! tile the clip contiguously from t=0, one per `window_seconds`, with
//! `ceil(duration / window_seconds)` windows and never fewer than one.

use crate::error::PredictError;
use crate::features::{ClipFeatures, FrameEmbedding};

/// A fixed-duration slice of video time, the model's unit of inference.
#[derive(Debug, Clone)]
pub struct Window {
    /// 0-based position in the timeline, increasing by 1.
    pub segment_index: usize,
    /// Inclusive start of the span in seconds, always on the window grid.
    pub start_time: f64,
    /// End of the span in seconds, clamped to the clip duration.
    pub end_time: f64,
    embeddings: Vec<FrameEmbedding>,
}

impl Window {
    /// The window's embeddings; length always equals the segmenter's
    /// `frames_per_window`.
    pub fn embeddings(&self) -> &[FrameEmbedding] {
        &self.embeddings
    }

    pub fn frame_count(&self) -> usize {
        self.embeddings.len()
    }
}

/// Walks a clip's time axis and yields fixed-shape windows.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    window_seconds: f64,
    frames_per_window: usize,
}

impl Segmenter {
    pub fn new(window_seconds: f64, frames_per_window: usize) -> Self {
        Self {
            window_seconds: if window_seconds > 0.0 {
                window_seconds
            } else {
                crate::config::DEFAULT_WINDOW_SECONDS
            },
            frames_per_window: frames_per_window.max(1),
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn frames_per_window(&self) -> usize {
        self.frames_per_window
    }

    /// Partition `clip` into contiguous windows covering its whole duration.
    pub fn segment(&self, clip: &ClipFeatures) -> Result<Vec<Window>, PredictError> {
        let total = clip.embeddings.len();
        if total == 0 {
            return Err(PredictError::EmptyInput);
        }
        let (fps, duration) = effective_timing(clip, self.window_seconds);
        let count = ((duration / self.window_seconds).ceil() as usize).max(1);

        let mut windows = Vec::with_capacity(count);
        for index in 0..count {
            let start_time = index as f64 * self.window_seconds;
            let end_time = (start_time + self.window_seconds).min(duration);
            // Frame indices truncate, matching the timestamps decoders report.
            let start_frame = ((start_time * fps) as usize).min(total - 1);
            let end_frame = (((start_time + self.window_seconds) * fps) as usize)
                .min(total)
                .max(start_frame + 1);
            let embeddings = sample_to_count(
                &clip.embeddings[start_frame..end_frame],
                self.frames_per_window,
            );
            windows.push(Window {
                segment_index: index,
                start_time,
                end_time,
                embeddings,
            });
        }
        Ok(windows)
    }

    /// Collapse the whole clip into one window, sampled the same way.
    ///
    /// Serves the single-shot prediction path, where one inference covers the
    /// entire upload.
    pub fn single_window(&self, clip: &ClipFeatures) -> Result<Window, PredictError> {
        if clip.embeddings.is_empty() {
            return Err(PredictError::EmptyInput);
        }
        let (_, duration) = effective_timing(clip, self.window_seconds);
        Ok(Window {
            segment_index: 0,
            start_time: 0.0,
            end_time: duration,
            embeddings: sample_to_count(&clip.embeddings, self.frames_per_window),
        })
    }
}

/// Frame rate and duration with degenerate extractor output patched up.
///
/// Prefers the reported values; reconstructs one from the other when a
/// decoder reports zeros, and falls back to a single window's worth of time
/// when both are missing.
fn effective_timing(clip: &ClipFeatures, window_seconds: f64) -> (f64, f64) {
    let total = clip.embeddings.len() as f64;
    let fps = clip.frame_rate;
    let duration = clip.duration_seconds;
    match (fps > 0.0, duration > 0.0) {
        (true, true) => (fps, duration),
        (true, false) => (fps, total / fps),
        (false, true) => (total / duration, duration),
        (false, false) => (total / window_seconds, window_seconds),
    }
}

/// Resample `frames` down (or pad up) to exactly `target` embeddings.
///
/// Dense inputs are sampled at evenly spaced, truncated indices; sparse
/// inputs are padded by repeating the last available embedding.
fn sample_to_count(frames: &[FrameEmbedding], target: usize) -> Vec<FrameEmbedding> {
    let count = frames.len();
    if count <= target {
        let mut out = frames.to_vec();
        if let Some(last) = out.last().cloned() {
            while out.len() < target {
                out.push(last.clone());
            }
        }
        return out;
    }
    if target == 1 {
        return vec![frames[0].clone()];
    }
    (0..target)
        .map(|step| {
            let position = step as f64 * (count - 1) as f64 / (target - 1) as f64;
            frames[position as usize].clone()
        })
        .collect()
}
