//! Ranking of raw class scores into ordered top-k predictions.
//!
//! Scores arrive on whatever scale the selected model produces and leave on
//! that same scale; this module only orders them. Ordering is total and
//! deterministic: score descending, ties broken by ascending class id.

use serde::Serialize;

use crate::catalog::ClassCatalog;
use crate::error::PredictError;
use crate::segment::Window;

/// One class with the confidence the model assigned it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredClass {
    pub action_id: usize,
    pub action_name: String,
    pub confidence: f32,
}

/// Ranked result for one probability vector, before segment metadata is
/// attached.
#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub top_prediction: ScoredClass,
    pub top5_predictions: Vec<ScoredClass>,
}

impl Ranking {
    /// Attach a window's identity and time bounds to this ranking.
    pub fn at_segment(self, window: &Window) -> RankedPrediction {
        RankedPrediction {
            segment_index: window.segment_index,
            start_time: window.start_time,
            end_time: window.end_time,
            top_prediction: self.top_prediction,
            top5_predictions: self.top5_predictions,
        }
    }
}

/// A segment's ranked prediction as returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPrediction {
    pub segment_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub top_prediction: ScoredClass,
    pub top5_predictions: Vec<ScoredClass>,
}

/// Rank `scores` against `catalog`, keeping the best `k` entries.
///
/// `scores` must line up with the catalog one-to-one; no normalization is
/// assumed or applied.
pub fn rank(scores: &[f32], catalog: &ClassCatalog, k: usize) -> Result<Ranking, PredictError> {
    if scores.len() != catalog.len() || catalog.is_empty() {
        return Err(PredictError::CatalogMismatch {
            classes: catalog.len(),
            scores: scores.len(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let take = k.max(1).min(order.len());
    let ranked: Vec<ScoredClass> = order[..take]
        .iter()
        .map(|&action_id| ScoredClass {
            action_id,
            action_name: catalog.name(action_id).unwrap_or_default().to_string(),
            confidence: scores[action_id],
        })
        .collect();

    Ok(Ranking {
        top_prediction: ranked[0].clone(),
        top5_predictions: ranked,
    })
}
