//! Frame-statistics embedder for decoded frames.
//!
//! Stand-in for a convolutional backbone: summarizes each frame with
//! per-channel statistics and zero-pads to the configured feature width.
//! Deterministic by construction so repeated runs over the same bytes produce
//! identical timelines.

use super::FrameEmbedding;

/// One decoded frame as interleaved RGB bytes.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major RGB.
    pub rgb: Vec<u8>,
}

/// Computes fixed-width embeddings from per-channel frame statistics.
#[derive(Debug, Clone, Copy)]
pub struct StatsEmbedder {
    feature_dim: usize,
}

impl StatsEmbedder {
    pub fn new(feature_dim: usize) -> Self {
        Self { feature_dim }
    }

    /// Embed one frame: per-channel mean, stddev, max, and min over pixels
    /// normalized to `[0, 1]`, zero-padded (or truncated) to the feature dim.
    pub fn embed(&self, frame: &DecodedFrame) -> FrameEmbedding {
        let pixels = (frame.width as usize) * (frame.height as usize);
        let mut features = Vec::with_capacity(self.feature_dim);
        if pixels == 0 || frame.rgb.len() < pixels * 3 {
            features.resize(self.feature_dim, 0.0);
            return FrameEmbedding::new(features);
        }

        let mut sums = [0.0f64; 3];
        let mut maxima = [f32::MIN; 3];
        let mut minima = [f32::MAX; 3];
        for pixel in frame.rgb.chunks_exact(3).take(pixels) {
            for (channel, &byte) in pixel.iter().enumerate() {
                let value = byte as f32 / 255.0;
                sums[channel] += value as f64;
                maxima[channel] = maxima[channel].max(value);
                minima[channel] = minima[channel].min(value);
            }
        }
        let means = sums.map(|sum| (sum / pixels as f64) as f32);

        let mut variance_sums = [0.0f64; 3];
        for pixel in frame.rgb.chunks_exact(3).take(pixels) {
            for (channel, &byte) in pixel.iter().enumerate() {
                let value = byte as f32 / 255.0;
                let delta = (value - means[channel]) as f64;
                variance_sums[channel] += delta * delta;
            }
        }
        let stddevs = variance_sums.map(|sum| ((sum / pixels as f64) as f32).sqrt());

        features.extend_from_slice(&means);
        features.extend_from_slice(&stddevs);
        features.extend_from_slice(&maxima);
        features.extend_from_slice(&minima);
        features.resize(self.feature_dim, 0.0);
        FrameEmbedding::new(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(r: u8, g: u8, b: u8) -> DecodedFrame {
        let mut rgb = Vec::with_capacity(4 * 4 * 3);
        for _ in 0..16 {
            rgb.extend_from_slice(&[r, g, b]);
        }
        DecodedFrame {
            width: 4,
            height: 4,
            rgb,
        }
    }

    #[test]
    fn embedding_has_requested_width() {
        let embedder = StatsEmbedder::new(2048);
        let embedding = embedder.embed(&solid_frame(10, 20, 30));
        assert_eq!(embedding.dim(), 2048);
    }

    #[test]
    fn solid_frame_has_zero_stddev_and_equal_extremes() {
        let embedder = StatsEmbedder::new(16);
        let embedding = embedder.embed(&solid_frame(255, 0, 128));
        let values = embedding.as_slice();
        // mean[0] == max[0] == min[0] == 1.0 for the saturated red channel
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!((values[6] - 1.0).abs() < 1e-6);
        assert!((values[9] - 1.0).abs() < 1e-6);
        // stddevs are zero on a solid color
        assert!(values[3].abs() < 1e-6);
        assert!(values[4].abs() < 1e-6);
        assert!(values[5].abs() < 1e-6);
    }

    #[test]
    fn embedding_is_deterministic() {
        let embedder = StatsEmbedder::new(64);
        let frame = DecodedFrame {
            width: 2,
            height: 2,
            rgb: vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        };
        assert_eq!(embedder.embed(&frame), embedder.embed(&frame));
    }

    #[test]
    fn degenerate_frame_embeds_to_zeros() {
        let embedder = StatsEmbedder::new(8);
        let empty = DecodedFrame {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        assert!(embedder.embed(&empty).as_slice().iter().all(|v| *v == 0.0));
    }
}
