//! PCM buffers and the pure sample-array helpers the rest of the session is
//! built on.
//!
//! RMS is the only loudness signal used anywhere in the crate; there is no
//! spectral analysis.

use std::fmt;

// ---------------------------------------------------------------------------
// PcmBuffer
// ---------------------------------------------------------------------------

/// Planar floating-point audio: one sample vector per channel.
///
/// Buffers are produced once and never mutated after being placed on a
/// track; helpers such as [`PcmBuffer::normalized`] return a new buffer.
#[derive(Clone, PartialEq)]
pub struct PcmBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Wrap a single channel of samples.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Build a buffer from planar channel data.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is empty or the channels differ in length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        assert!(!channels.is_empty(), "PcmBuffer needs at least one channel");
        let len = channels[0].len();
        assert!(
            channels.iter().all(|c| c.len() == len),
            "PcmBuffer channels must have equal length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    /// A silent mono buffer of `len` samples.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::mono(vec![0.0; len], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples of channel `index`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// The first channel; the analysis path only ever looks at this one.
    pub fn samples(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Number of sample frames (per channel).
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Copy of this buffer with every channel peak-normalised.
    ///
    /// See [`normalize_peak`] for the exact rule.
    pub fn normalized(&self) -> Self {
        let mut channels = self.channels.clone();
        for channel in &mut channels {
            normalize_peak(channel);
        }
        Self {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Copy the frames in `[start_secs, end_secs)` into a new buffer.
    ///
    /// Bounds are clamped to the buffer; an inverted range yields an empty
    /// buffer.
    pub fn slice_secs(&self, start_secs: f64, end_secs: f64) -> Self {
        let rate = self.sample_rate as f64;
        let start = ((start_secs.max(0.0) * rate).floor() as usize).min(self.len());
        let end = ((end_secs.max(0.0) * rate).floor() as usize)
            .min(self.len())
            .max(start);
        Self {
            channels: self
                .channels
                .iter()
                .map(|c| c[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }
}

impl fmt::Debug for PcmBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmBuffer")
            .field("channels", &self.channels.len())
            .field("frames", &self.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Root-mean-square energy of `window`.  An empty window has zero energy.
pub fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
    mean_sq.sqrt()
}

/// Largest absolute sample value in `samples`.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Lay out `buffers` one after the other in a single vector.
pub fn concatenate<B: AsRef<[f32]>>(buffers: &[B]) -> Vec<f32> {
    let total = buffers.iter().map(|b| b.as_ref().len()).sum();
    let mut out = Vec::with_capacity(total);
    for buffer in buffers {
        out.extend_from_slice(buffer.as_ref());
    }
    out
}

/// Scale `samples` in place so the peak becomes exactly 1.0.
///
/// Only applied when the existing peak lies in `(0, 1)`; silent buffers and
/// buffers already at or above full scale are left untouched.
pub fn normalize_peak(samples: &mut [f32]) {
    let max = peak(samples);
    if max > 0.0 && max < 1.0 {
        let ratio = 1.0 / max;
        for s in samples.iter_mut() {
            *s *= ratio;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.25; 10]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn rms_of_empty_window_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn concatenate_preserves_order() {
        let frames = vec![vec![1.0_f32, 2.0], vec![], vec![3.0]];
        assert_eq!(concatenate(&frames), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn normalize_scales_quiet_buffer_to_unity() {
        let mut samples = vec![0.1_f32, -0.25, 0.2];
        normalize_peak(&mut samples);
        assert!((peak(&samples) - 1.0).abs() < 1e-6);
        assert!((samples[0] - 0.4).abs() < 1e-6);
        assert!((samples[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_silence_and_full_scale_alone() {
        let mut silent = vec![0.0_f32; 8];
        normalize_peak(&mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));

        let mut loud = vec![0.5_f32, 1.5];
        normalize_peak(&mut loud);
        assert_eq!(loud, vec![0.5, 1.5]);
    }

    #[test]
    fn normalized_does_not_touch_original() {
        let buf = PcmBuffer::mono(vec![0.25, -0.5], 8_000);
        let norm = buf.normalized();
        assert_eq!(buf.samples(), &[0.25, -0.5]);
        assert_eq!(norm.samples(), &[0.5, -1.0]);
    }

    #[test]
    fn slice_clamps_to_bounds() {
        let buf = PcmBuffer::mono((0..100).map(|i| i as f32).collect(), 100);
        let mid = buf.slice_secs(0.25, 0.5);
        assert_eq!(mid.len(), 25);
        assert_eq!(mid.samples()[0], 25.0);

        assert_eq!(buf.slice_secs(0.9, 5.0).len(), 10);
        assert!(buf.slice_secs(0.6, 0.2).is_empty());
    }

    #[test]
    fn duration_from_rate() {
        let buf = PcmBuffer::silence(22_050, 44_100);
        assert!((buf.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn mismatched_channels_panic() {
        PcmBuffer::from_channels(vec![vec![0.0; 3], vec![0.0; 2]], 8_000);
    }
}
