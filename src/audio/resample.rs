//! Channel mixing and sample-rate conversion.
//!
//! Everything on the timeline runs at the session rate.  Two paths lead
//! there:
//!
//! ```text
//! capture chunks ──downmix_to_mono──▶ StreamResampler (stateful, one per stream)
//! whole buffers  ──mix_planar──────▶ resample (one-shot, exact output length)
//! ```
//!
//! Both sit on `rubato`'s FFT resampler.  The streaming form keeps filter
//! state and leftover input between calls, so the number of output samples
//! tracks the number of input samples exactly and sample-counted time does
//! not drift against the wall clock.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Input frames per FFT block.
const BLOCK_FRAMES: usize = 1024;

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("cannot resample {from} Hz to {to} Hz: {source}")]
    Setup {
        from: u32,
        to: u32,
        #[source]
        source: rubato::ResamplerConstructionError,
    },

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Average interleaved frames of `channels` samples into one mono sample
/// each.  A trailing partial frame is dropped; zero channels yields nothing.
///
/// ```rust
/// use jam_session::audio::downmix_to_mono;
///
/// let stereo = [0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let width = channels as usize;
    if width <= 1 {
        return if width == 1 { samples.to_vec() } else { Vec::new() };
    }
    let scale = 1.0 / width as f32;
    samples
        .chunks_exact(width)
        .map(|frame| frame.iter().fold(0.0, |acc, s| acc + s) * scale)
        .collect()
}

/// Average planar channels into one.
pub fn mix_planar(channels: &[&[f32]]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [only] => only.to_vec(),
        _ => {
            let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
            let n = channels.len() as f32;
            (0..len)
                .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / n)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Mono rate converter for a continuous stream delivered in pieces of any
/// size.
///
/// Input is buffered until a full FFT block is available; the filter's
/// start-up delay is trimmed from the front of the output, so output sample
/// `n` lines up with input time `n / target_rate`.
pub struct StreamResampler {
    inner: FftFixedIn<f32>,
    source_rate: u32,
    target_rate: u32,
    pending: Vec<f32>,
    delay: usize,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, ResampleError> {
        let inner = FftFixedIn::<f32>::new(
            source_rate as usize,
            target_rate as usize,
            BLOCK_FRAMES,
            1,
            1,
        )
        .map_err(|source| ResampleError::Setup {
            from: source_rate,
            to: target_rate,
            source,
        })?;
        let delay = inner.output_delay();

        Ok(Self {
            inner,
            source_rate,
            target_rate,
            pending: Vec::with_capacity(BLOCK_FRAMES * 2),
            delay,
        })
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Feed the next piece of the stream; returns whatever output the
    /// completed blocks produced (possibly nothing).
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, ResampleError> {
        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        let mut used = 0;
        loop {
            let need = self.inner.input_frames_next();
            if self.pending.len() - used < need {
                break;
            }
            let block = self
                .inner
                .process(&[&self.pending[used..used + need]], None)?;
            used += need;

            if let Some(produced) = block.into_iter().next() {
                let skip = self.delay.min(produced.len());
                self.delay -= skip;
                out.extend_from_slice(&produced[skip..]);
            }
        }
        self.pending.drain(..used);
        Ok(out)
    }

    /// Push silence through until at least `wanted` more samples come out.
    fn flush(&mut self, wanted: usize) -> Result<Vec<f32>, ResampleError> {
        let mut out = Vec::with_capacity(wanted);
        while out.len() < wanted {
            let pad = vec![0.0; self.inner.input_frames_next()];
            out.extend(self.process(&pad)?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Convert a complete mono buffer from `source_rate` to `target_rate`.
///
/// The result holds `round(len * target / source)` samples.  Equal rates
/// copy; empty input or a zero rate yields an empty vector.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Ok(Vec::new());
    }

    let expected = (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let mut stream = StreamResampler::new(source_rate, target_rate)?;
    let mut out = stream.process(samples)?;
    if out.len() < expected {
        let tail = stream.flush(expected - out.len())?;
        out.extend(tail);
    }
    out.truncate(expected);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn tone(hz: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * hz * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn downmix_averages_frames() {
        let out = downmix_to_mono(&[1.0_f32, -1.0, 0.5, 0.5, 0.9], 2);
        assert_eq!(out, vec![0.0, 0.5]);
        assert_eq!(downmix_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(downmix_to_mono(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn mix_planar_averages() {
        let left: &[f32] = &[1.0, 0.0];
        let right: &[f32] = &[0.0, 1.0];
        assert_eq!(mix_planar(&[left, right]), vec![0.5, 0.5]);
        assert_eq!(mix_planar(&[left]), vec![1.0, 0.0]);
    }

    #[test]
    fn equal_rates_copy() {
        let input = tone(440.0, 44_100, 300);
        assert_eq!(resample(&input, 44_100, 44_100).unwrap(), input);
        assert!(resample(&[], 48_000, 44_100).unwrap().is_empty());
    }

    #[test]
    fn one_shot_length_is_exact() {
        assert_eq!(resample(&vec![0.0; 480], 48_000, 16_000).unwrap().len(), 160);
        assert_eq!(resample(&vec![0.0; 80], 8_000, 16_000).unwrap().len(), 160);
        assert_eq!(resample(&vec![0.0; 48_000], 48_000, 44_100).unwrap().len(), 44_100);
    }

    #[test]
    fn one_shot_keeps_level_and_alignment() {
        let input = tone(110.0, 48_000, 48_000);
        let out = resample(&input, 48_000, 44_100).unwrap();
        let expected = tone(110.0, 44_100, 44_100);

        // Away from the edges the output matches the tone sampled natively.
        let worst = out[2_000..42_000]
            .iter()
            .zip(&expected[2_000..42_000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(worst < 0.03, "max deviation {worst}");
    }

    #[test]
    fn streaming_output_tracks_input_count() {
        let mut stream = StreamResampler::new(48_000, 44_100).unwrap();
        let input = vec![0.0_f32; 512];
        let mut produced = 0_usize;
        let mut consumed = 0_usize;

        // Two minutes of 512-frame callbacks.
        for _ in 0..(48_000 * 120 / 512) {
            produced += stream.process(&input).unwrap().len();
            consumed += input.len();
        }

        let ideal = consumed as f64 * 44_100.0 / 48_000.0;
        // Anything missing is still buffered: at most a block plus the
        // trimmed filter delay.
        let missing = ideal - produced as f64;
        assert!(missing >= 0.0, "produced more than the input covers");
        assert!(missing < 2.0 * BLOCK_FRAMES as f64, "missing {missing} samples");
    }

    #[test]
    fn streaming_matches_one_shot() {
        let input = tone(220.0, 32_000, 32_000);
        let whole = resample(&input, 32_000, 16_000).unwrap();

        let mut stream = StreamResampler::new(32_000, 16_000).unwrap();
        let mut pieces = Vec::new();
        for chunk in input.chunks(333) {
            pieces.extend(stream.process(chunk).unwrap());
        }
        assert!(!pieces.is_empty());
        for (a, b) in pieces.iter().zip(&whole) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
