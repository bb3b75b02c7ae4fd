//! Monophonic pitch estimation (YIN).
//!
//! ## Algorithm
//!
//! For a window of `2W` samples, YIN computes the squared difference
//! function `d(τ) = Σ (x[i] − x[i+τ])²` over the first `W` samples, turns it
//! into the cumulative-mean-normalised difference `d'(τ)`, and picks the
//! first lag whose `d'` dips below an absolute threshold (then slides down
//! to the local minimum).  Parabolic interpolation around that lag gives a
//! sub-sample period estimate.
//!
//! The detector keeps its scratch buffer between calls so the per-window
//! cost is arithmetic only.

// ---------------------------------------------------------------------------
// YinDetector
// ---------------------------------------------------------------------------

/// Reusable YIN pitch estimator for one sample rate.
///
/// # Example
///
/// ```rust
/// use jam_session::audio::YinDetector;
///
/// let rate = 8_000;
/// let tone: Vec<f32> = (0..1024)
///     .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin())
///     .collect();
///
/// let mut yin = YinDetector::new(rate, 0.15, 50.0, 2000.0);
/// let hz = yin.detect(&tone).unwrap();
/// assert!((hz - 220.0).abs() < 2.0);
/// ```
pub struct YinDetector {
    sample_rate: u32,
    threshold: f32,
    min_frequency: f32,
    max_frequency: f32,
    scratch: Vec<f32>,
}

impl YinDetector {
    /// Create a detector reporting frequencies in `[min_frequency, max_frequency]`.
    pub fn new(sample_rate: u32, threshold: f32, min_frequency: f32, max_frequency: f32) -> Self {
        Self {
            sample_rate,
            threshold,
            min_frequency,
            max_frequency,
            scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Estimate the fundamental frequency of `window` in Hz.
    ///
    /// Returns `None` for silence, unpitched material, or windows too short
    /// to contain one period of `min_frequency`.
    pub fn detect(&mut self, window: &[f32]) -> Option<f32> {
        let half = window.len() / 2;
        if half < 3 || self.sample_rate == 0 {
            return None;
        }

        let rate = self.sample_rate as f32;
        let tau_min = ((rate / self.max_frequency).floor() as usize).max(2);
        let tau_max = ((rate / self.min_frequency).ceil() as usize).min(half - 1);
        if tau_min >= tau_max {
            return None;
        }

        let cmnd = &mut self.scratch;
        cmnd.clear();
        cmnd.resize(tau_max + 1, 0.0);

        // Squared difference function.
        for tau in 1..=tau_max {
            let mut sum = 0.0_f32;
            for i in 0..half {
                let delta = window[i] - window[i + tau];
                sum += delta * delta;
            }
            cmnd[tau] = sum;
        }

        // Cumulative mean normalisation.
        cmnd[0] = 1.0;
        let mut running = 0.0_f32;
        for tau in 1..=tau_max {
            running += cmnd[tau];
            cmnd[tau] = if running > 0.0 {
                cmnd[tau] * tau as f32 / running
            } else {
                1.0
            };
        }

        // Absolute threshold, then walk down to the local minimum.
        let mut tau = tau_min;
        let estimate = loop {
            if tau > tau_max {
                return None;
            }
            if cmnd[tau] < self.threshold {
                while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                break tau;
            }
            tau += 1;
        };

        let period = parabolic_refine(cmnd, estimate);
        if period <= 0.0 {
            return None;
        }

        let hz = rate / period;
        (self.min_frequency..=self.max_frequency)
            .contains(&hz)
            .then_some(hz)
    }
}

/// Fit a parabola through `values[tau-1..=tau+1]` and return the abscissa of
/// its vertex.
fn parabolic_refine(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f32;
    }
    let (s0, s1, s2) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = 2.0 * (2.0 * s1 - s2 - s0);
    if denom.abs() < f32::EPSILON {
        return tau as f32;
    }
    tau as f32 + (s2 - s0) / denom
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
