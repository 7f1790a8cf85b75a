use super::{VideoFrame, SIGNATURE_BINS_PER_CHANNEL, SIGNATURE_SIZE};

/// Color-distribution fingerprint of a single frame.
///
/// A signature is a joint 3-D histogram over the HSV representation of the frame, with
/// [SIGNATURE_BINS_PER_CHANNEL] bins along each channel, normalized so the bins sum
/// to 1.0. Normalization makes signatures comparable across resolutions, and the HSV
/// binning makes them reasonably stable under exposure drift. Computing a signature
/// makes exactly one pass over the pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    bins: [f32; SIGNATURE_SIZE],
}

impl Signature {
    /// Computes the signature of a frame.
    pub fn of_frame(frame: &VideoFrame) -> Self {
        Self::from_rgb24(frame.data(), frame.width(), frame.height())
    }

    /// Computes a signature from packed RGB24 pixel data.
    pub fn from_rgb24(data: &[u8], width: u32, height: u32) -> Self {
        let bins_per_channel = SIGNATURE_BINS_PER_CHANNEL;
        let mut bins = [0f32; SIGNATURE_SIZE];

        let pixel_count = (width as usize) * (height as usize);
        debug_assert!(data.len() >= pixel_count * 3);

        for pixel in data[..pixel_count * 3].chunks_exact(3) {
            let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            let h_bin = bin_index(h / 360.0, bins_per_channel);
            let s_bin = bin_index(s, bins_per_channel);
            let v_bin = bin_index(v, bins_per_channel);
            bins[(h_bin * bins_per_channel + s_bin) * bins_per_channel + v_bin] += 1.0;
        }

        if pixel_count > 0 {
            let total = pixel_count as f32;
            for bin in &mut bins {
                *bin /= total;
            }
        }

        Self { bins }
    }

    /// Returns the raw histogram bins.
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Computes the Pearson correlation between two signatures.
    ///
    /// The result is in [-1, 1]: 1.0 for identical distributions, lower for dissimilar
    /// ones. A histogram with zero variance across its bins (a perfectly flat
    /// distribution) has no defined correlation; in that degenerate case this returns
    /// 1.0 if both signatures are flat and 0.0 if only one is.
    pub fn correlation(&self, other: &Signature) -> f64 {
        let n = SIGNATURE_SIZE as f64;

        let mean_a: f64 = self.bins.iter().map(|&b| b as f64).sum::<f64>() / n;
        let mean_b: f64 = other.bins.iter().map(|&b| b as f64).sum::<f64>() / n;

        let mut covariance = 0.0;
        let mut variance_a = 0.0;
        let mut variance_b = 0.0;
        for (&a, &b) in self.bins.iter().zip(other.bins.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            covariance += da * db;
            variance_a += da * da;
            variance_b += db * db;
        }

        let flat_a = variance_a < f64::EPSILON;
        let flat_b = variance_b < f64::EPSILON;
        match (flat_a, flat_b) {
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => covariance / (variance_a.sqrt() * variance_b.sqrt()),
        }
    }
}

// Maps a channel value in [0, 1] to a bin index, clamping the upper edge.
#[inline]
fn bin_index(value: f32, bins: usize) -> usize {
    ((value * bins as f32) as usize).min(bins - 1)
}

// Standard max/min RGB to HSV mapping. Hue is in [0, 360), saturation and value
// are in [0, 1].
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { delta / max };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h, s, v)
}
