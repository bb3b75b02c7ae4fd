//! Tempo estimation for uploaded backtracks.
//!
//! An onset envelope is built from the positive frame-to-frame rise in RMS
//! (100 frames per second), mean-removed, and autocorrelated over the lags
//! that correspond to 60–200 BPM.  The strongest lag wins.

use crate::audio::pcm::rms;

const FRAMES_PER_SEC: u32 = 100;
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

/// Estimate the tempo of mono `samples` in beats per minute.
///
/// Returns `None` when the audio is too short to cover two periods at the
/// slowest tempo or carries no rhythmic energy at all.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32) -> Option<u32> {
    let hop = (sample_rate / FRAMES_PER_SEC) as usize;
    if hop == 0 {
        return None;
    }

    let energy: Vec<f32> = samples.chunks_exact(hop).map(rms).collect();
    let mut envelope: Vec<f64> = energy
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0) as f64)
        .collect();

    let frame_rate = sample_rate as f64 / hop as f64;
    let min_lag = (frame_rate * 60.0 / MAX_BPM).floor() as usize;
    let max_lag = (frame_rate * 60.0 / MIN_BPM).ceil() as usize;
    if min_lag == 0 || envelope.len() < 2 * max_lag {
        return None;
    }

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    if mean <= f64::EPSILON {
        return None;
    }
    envelope.iter_mut().for_each(|v| *v -= mean);

    let (best_lag, best_score) = (min_lag..=max_lag)
        .map(|lag| {
            let score: f64 = envelope
                .iter()
                .zip(&envelope[lag..])
                .map(|(a, b)| a * b)
                .sum();
            (lag, score)
        })
        .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if best_score <= 0.0 {
        return None;
    }
    let bpm = (60.0 * frame_rate / best_lag as f64).round() as u32;
    log::debug!("tempo: lag {best_lag} frames → {bpm} BPM");
    Some(bpm)
}
