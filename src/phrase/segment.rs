//! Offline segmentation of an already-recorded buffer.
//!
//! The buffer is scanned in fixed 50 ms windows.  A window whose RMS (first
//! channel) exceeds the threshold opens a segment; the first quiet window
//! closes it.  Segments shorter than `min_segment_secs` are dropped, and a
//! segment still open at the end of the buffer is closed there.

use uuid::Uuid;

use crate::audio::pcm::{rms, PcmBuffer};

/// Analysis window length.
const WINDOW_SECS: f64 = 0.05;

/// One sounding region of a buffer, with its own copy of the audio.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub id: Uuid,
    /// Seconds from the start of the source buffer.
    pub start_time: f64,
    pub end_time: f64,
    /// All channels of the source, sliced to `[start_time, end_time)`.
    pub buffer: PcmBuffer,
}

impl AudioSegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Split `buffer` into sound segments separated by quiet windows.
pub fn segment_buffer(
    buffer: &PcmBuffer,
    threshold: f32,
    min_segment_secs: f64,
) -> Vec<AudioSegment> {
    let rate = buffer.sample_rate() as f64;
    let window = ((rate * WINDOW_SECS).floor() as usize).max(1);
    let data = buffer.channel(0);

    let mut segments = Vec::new();
    let mut open: Option<f64> = None;

    let close = |start: f64, end: f64, segments: &mut Vec<AudioSegment>| {
        if end - start >= min_segment_secs {
            segments.push(AudioSegment {
                id: Uuid::new_v4(),
                start_time: start,
                end_time: end,
                buffer: buffer.slice_secs(start, end),
            });
        }
    };

    for (index, chunk) in data.chunks(window).enumerate() {
        let at = (index * window) as f64 / rate;
        let sounding = rms(chunk) > threshold;
        match (open, sounding) {
            (None, true) => open = Some(at),
            (Some(start), false) => {
                close(start, at, &mut segments);
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        close(start, buffer.duration_secs(), &mut segments);
    }

    log::debug!(
        "segment: {} segment(s) in {:.2}s buffer",
        segments.len(),
        buffer.duration_secs()
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    fn tone(secs: f64, level: f32) -> Vec<f32> {
        let n = (secs * RATE as f64).round() as usize;
        (0..n).map(|i| if i % 2 == 0 { level } else { -level }).collect()
    }

    fn silence(secs: f64) -> Vec<f32> {
        vec![0.0; (secs * RATE as f64).round() as usize]
    }

    #[test]
    fn splits_on_quiet_windows() {
        let mut samples = silence(0.5);
        samples.extend(tone(1.0, 0.2));
        samples.extend(silence(0.5));
        samples.extend(tone(0.5, 0.2));
        samples.extend(silence(0.5));
        let buffer = PcmBuffer::mono(samples, RATE);

        let segments = segment_buffer(&buffer, 0.005, 0.1);
        assert_eq!(segments.len(), 2);
        assert!((segments[0].start_time - 0.5).abs() < 1e-9);
        assert!((segments[0].end_time - 1.5).abs() < 1e-9);
        assert!((segments[1].start_time - 2.0).abs() < 1e-9);
        assert!((segments[1].duration_secs() - 0.5).abs() < 1e-9);
        assert_ne!(segments[0].id, segments[1].id);
        assert!((segments[0].buffer.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn drops_segments_below_minimum() {
        let mut samples = silence(0.5);
        samples.extend(tone(0.05, 0.2));
        samples.extend(silence(0.5));
        let buffer = PcmBuffer::mono(samples, RATE);
        assert!(segment_buffer(&buffer, 0.005, 0.1).is_empty());
    }

    #[test]
    fn open_segment_closes_at_buffer_end() {
        let mut samples = silence(0.25);
        samples.extend(tone(0.75, 0.2));
        let buffer = PcmBuffer::mono(samples, RATE);

        let segments = segment_buffer(&buffer, 0.005, 0.1);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].end_time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stereo_segments_keep_both_channels() {
        let mut left = silence(0.5);
        left.extend(tone(0.5, 0.2));
        left.extend(silence(0.5));
        let right = vec![0.1; left.len()];
        let buffer = PcmBuffer::from_channels(vec![left, right], RATE);

        let segments = segment_buffer(&buffer, 0.005, 0.1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].buffer.num_channels(), 2);
    }

    #[test]
    fn silent_buffer_has_no_segments() {
        let buffer = PcmBuffer::silence(RATE as usize, RATE);
        assert!(segment_buffer(&buffer, 0.005, 0.1).is_empty());
    }
}
