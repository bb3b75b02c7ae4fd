//! Note → audio rendering.
//!
//! A single triangle-wave voice with an ADSR envelope renders the note list
//! offline against a virtual clock that starts at zero.  The voice is
//! monophonic: a new onset cuts off whatever release is still ringing, so
//! the output never exceeds the loudest velocity.
//!
//! Rendering is pure arithmetic on the note list and [`SynthConfig`]; two
//! calls with the same inputs produce bit-identical buffers.

use crate::audio::pcm::PcmBuffer;
use crate::config::SynthConfig;
use crate::midi::note::{Note, NoteList};

/// Offline renderer for [`NoteList`]s.
pub struct NoteSynthesizer {
    config: SynthConfig,
}

impl NoteSynthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Length in seconds of the buffer [`render`](Self::render) produces:
    /// the last release point plus the configured tail.
    pub fn horizon_secs(&self, notes: &NoteList) -> f64 {
        notes.end_time() + self.config.tail_secs
    }

    /// Render `notes` to a mono buffer.
    ///
    /// Callers check for an empty list first; an empty list renders the
    /// tail as silence.
    pub fn render(&self, notes: &NoteList) -> PcmBuffer {
        let rate = self.config.sample_rate;
        let total = (self.horizon_secs(notes) * rate as f64).ceil() as usize;
        let mut out = vec![0.0_f32; total];

        let onsets: Vec<usize> = notes
            .iter()
            .map(|n| (n.start_time * rate as f64).round() as usize)
            .collect();

        for (idx, note) in notes.iter().enumerate() {
            let start = onsets[idx].min(total);
            let cutoff = onsets
                .get(idx + 1)
                .copied()
                .unwrap_or(total)
                .clamp(start, total);
            self.render_voice(note, &mut out[start..cutoff]);
        }

        PcmBuffer::mono(out, rate)
    }

    /// Write one note's attack/decay/sustain/release into `dest`, which
    /// starts at the note onset.
    fn render_voice(&self, note: &Note, dest: &mut [f32]) {
        let rate = self.config.sample_rate as f32;
        let freq = note.frequency();
        let gate = note.duration as f32;
        let release = self.config.release_secs.max(1.0 / rate);
        let gate_level = self.envelope_held(gate);

        for (i, sample) in dest.iter_mut().enumerate() {
            let t = i as f32 / rate;
            let level = if t < gate {
                self.envelope_held(t)
            } else {
                let r = (t - gate) / release;
                if r >= 1.0 {
                    break;
                }
                gate_level * (1.0 - r)
            };
            let phase = (t * freq).fract();
            *sample = triangle(phase) * level * note.velocity;
        }
    }

    /// Envelope level `t` seconds after the attack while the key is held.
    fn envelope_held(&self, t: f32) -> f32 {
        let attack = self.config.attack_secs;
        let decay = self.config.decay_secs;
        let sustain = self.config.sustain_level.clamp(0.0, 1.0);

        if attack > 0.0 && t < attack {
            t / attack
        } else if decay > 0.0 && t < attack + decay {
            1.0 - (1.0 - sustain) * (t - attack) / decay
        } else {
            sustain
        }
    }
}

impl Default for NoteSynthesizer {
    fn default() -> Self {
        Self::new(SynthConfig::default())
    }
}

/// Unit triangle wave starting at zero and rising, `phase` in `[0, 1)`.
#[inline]
fn triangle(phase: f32) -> f32 {
    if phase < 0.25 {
        4.0 * phase
    } else if phase < 0.75 {
        2.0 - 4.0 * phase
    } else {
        4.0 * phase - 4.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
