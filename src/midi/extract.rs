//! Audio → note extraction for monophonic phrases.
//!
//! A fixed window slides across the phrase with a fixed hop.  Each window's
//! pitch is rounded to the nearest semitone; a window that repeats the
//! previous note's pitch within the merge window stretches that note instead
//! of starting a new one, which absorbs frame-to-frame jitter on sustained
//! notes.

use crate::audio::pcm::PcmBuffer;
use crate::audio::pitch::YinDetector;
use crate::config::ExtractorConfig;
use crate::midi::note::{frequency_to_midi, Note, NoteList};

/// Sliding-window pitch tracker producing a [`NoteList`].
pub struct NoteExtractor {
    config: ExtractorConfig,
}

impl NoteExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract notes from the first channel of `phrase`.
    ///
    /// An empty buffer, or one in which no window carries a pitch, yields an
    /// empty list.
    pub fn extract(&self, phrase: &PcmBuffer) -> NoteList {
        let data = phrase.samples();
        let rate = phrase.sample_rate();
        let window = self.config.window_size;
        let hop = self.config.hop_size.max(1);

        let mut notes = NoteList::new();
        if rate == 0 || window == 0 || data.len() <= window {
            return notes;
        }

        let mut yin = YinDetector::new(
            rate,
            self.config.yin_threshold,
            self.config.min_frequency_hz,
            self.config.max_frequency_hz,
        );

        let mut offset = 0;
        while offset + window < data.len() {
            if let Some(hz) = yin.detect(&data[offset..offset + window]) {
                let time = offset as f64 / rate as f64;
                let midi = frequency_to_midi(hz).round();
                if (0.0..=127.0).contains(&midi) {
                    self.accept(&mut notes, midi as u8, time);
                }
            }
            offset += hop;
        }

        log::debug!(
            "extractor: {} notes from {:.2}s phrase",
            notes.len(),
            phrase.duration_secs()
        );
        notes
    }

    fn accept(&self, notes: &mut NoteList, pitch: u8, time: f64) {
        let merge_window = self.config.merge_window_secs;
        let default_len = self.config.default_note_secs;

        if let Some(last) = notes.last_mut() {
            if last.pitch == pitch && time - last.start_time < merge_window {
                last.duration = time - last.start_time + default_len;
                return;
            }
        }

        notes.push_in_order(Note {
            pitch,
            start_time: time,
            duration: default_len,
            velocity: self.config.default_velocity,
        });
    }
}

impl Default for NoteExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const RATE: u32 = 8_000;

    fn small_window_config() -> ExtractorConfig {
        ExtractorConfig {
            window_size: 512,
            hop_size: 256,
            ..ExtractorConfig::default()
        }
    }

    fn tone(hz: f32, secs: f32) -> Vec<f32> {
        let n = (secs * RATE as f32) as usize;
        (0..n)
            .map(|i| (2.0 * PI * hz * i as f32 / RATE as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn empty_buffer_yields_no_notes() {
        let extractor = NoteExtractor::default();
        assert!(extractor.extract(&PcmBuffer::silence(0, RATE)).is_empty());
    }

    #[test]
    fn silence_yields_no_notes() {
        let extractor = NoteExtractor::new(small_window_config());
        assert!(extractor
            .extract(&PcmBuffer::silence(RATE as usize, RATE))
            .is_empty());
    }

    #[test]
    fn steady_tone_produces_correct_pitch() {
        let extractor = NoteExtractor::new(small_window_config());
        let notes = extractor.extract(&PcmBuffer::mono(tone(440.0, 0.15), RATE));

        assert!(!notes.is_empty());
        assert!(notes.iter().all(|n| n.pitch == 69), "{notes:?}");
        assert!((notes.notes()[0].velocity - 0.7).abs() < 1e-6);
        assert_eq!(notes.notes()[0].start_time, 0.0);
    }

    #[test]
    fn repeated_pitch_within_merge_window_extends_note() {
        let extractor = NoteExtractor::new(small_window_config());
        // 0.15 s keeps every window within 0.2 s of the first onset.
        let notes = extractor.extract(&PcmBuffer::mono(tone(440.0, 0.15), RATE));

        assert_eq!(notes.len(), 1, "{notes:?}");
        let note = notes.notes()[0];
        assert!(note.duration > 0.1, "duration {}", note.duration);
    }

    #[test]
    fn long_tone_restarts_after_merge_window() {
        let extractor = NoteExtractor::new(small_window_config());
        let notes = extractor.extract(&PcmBuffer::mono(tone(440.0, 0.6), RATE));

        assert!(notes.len() >= 2, "{notes:?}");
        for pair in notes.notes().windows(2) {
            assert!(pair[0].start_time < pair[1].start_time);
        }
    }

    #[test]
    fn pitch_change_starts_new_note() {
        let extractor = NoteExtractor::new(small_window_config());
        let mut samples = tone(440.0, 0.15);
        samples.extend(tone(523.25, 0.15));
        let notes = extractor.extract(&PcmBuffer::mono(samples, RATE));

        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert!(pitches.contains(&69), "{pitches:?}");
        assert!(pitches.contains(&72), "{pitches:?}");
    }
}
