//! Per-frame feature types and the extractor seam.
//!
//! Frame decoding and the convolutional backbone live outside this crate; the
//! pipeline only sees the [`FeatureExtractor`] trait and the embeddings it
//! yields.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod stats;

/// Upload extensions the boundary layer accepts, lowercase with leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".webm"];

/// A fixed-length learned summary of one decoded video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEmbedding {
    values: Vec<f32>,
}

impl FrameEmbedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of feature channels in this embedding.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Everything the extractor learned about one video.
#[derive(Debug, Clone)]
pub struct ClipFeatures {
    /// Source frame rate in frames per second.
    pub frame_rate: f64,
    /// Total clip duration in seconds.
    pub duration_seconds: f64,
    /// One embedding per decoded frame, in presentation order.
    pub embeddings: Vec<FrameEmbedding>,
}

/// Errors raised by a feature extractor before any window exists.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The container format or codec is not handled.
    #[error("unsupported media format '{extension}'")]
    UnsupportedFormat { extension: String },
    /// The bytes could not be decoded as video.
    #[error("corrupt media: {reason}")]
    CorruptMedia { reason: String },
    /// Spilling or reading the media on disk failed.
    #[error("media io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns raw video bytes into per-frame embeddings.
///
/// Implementations own demuxing, decoding, and the feature backbone. They
/// must be safe to call from multiple requests at once.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, video: &[u8]) -> Result<ClipFeatures, ExtractionError>;
}

/// Extractor that serves a feature sequence computed elsewhere.
///
/// Used by the offline tooling (and tests) to replay an exported per-frame
/// feature dump through the pipeline without touching a decoder.
#[derive(Debug, Clone)]
pub struct PrecomputedExtractor {
    clip: ClipFeatures,
}

impl PrecomputedExtractor {
    pub fn new(clip: ClipFeatures) -> Self {
        Self { clip }
    }
}

impl FeatureExtractor for PrecomputedExtractor {
    fn extract(&self, _video: &[u8]) -> Result<ClipFeatures, ExtractionError> {
        Ok(self.clip.clone())
    }
}

/// Uploaded media spilled to a suffix-preserving temp file.
///
/// Decoders generally want a seekable path rather than a byte slice. The file
/// is removed when the guard drops, so media never outlives its request.
pub struct TempVideo {
    file: tempfile::NamedTempFile,
}

impl TempVideo {
    /// Write `bytes` to a fresh temp file carrying `extension` (with dot).
    pub fn spill(bytes: &[u8], extension: &str) -> Result<Self, ExtractionError> {
        let mut file = tempfile::Builder::new()
            .prefix("entrechat-upload-")
            .suffix(extension)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Whether the boundary layer should accept a file with this name.
pub fn is_supported_extension(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercased extension of `file_name`, including the leading dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    PathBuf::from(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}
