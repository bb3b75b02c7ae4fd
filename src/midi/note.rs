//! Symbolic notes and ordered note lists.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// NoteError
// ---------------------------------------------------------------------------

/// A note arriving from outside the crate failed range validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NoteError {
    #[error("pitch {0} is outside the MIDI range 0-127")]
    Pitch(f64),

    #[error("velocity {0} is outside 0.0-1.0")]
    Velocity(f64),

    #[error("note timing is invalid (start {start_time}, duration {duration})")]
    Timing { start_time: f64, duration: f64 },

    #[error("note ends at {end_time}s, past the {max}s limit")]
    TooLong { end_time: f64, max: f64 },
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// One note of a phrase.
///
/// `start_time` is relative to the start of the phrase the note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number (60 = middle C).
    pub pitch: u8,
    /// Onset in seconds from the start of the phrase.
    pub start_time: f64,
    /// Length in seconds.
    pub duration: f64,
    /// Normalised velocity (0.0 – 1.0).
    pub velocity: f32,
}

impl Note {
    /// Build a note from untrusted numeric fields.
    ///
    /// Fractional pitches are rounded to the nearest semitone before the
    /// range check.
    pub fn validated(
        pitch: f64,
        start_time: f64,
        duration: f64,
        velocity: f64,
    ) -> Result<Self, NoteError> {
        let rounded = pitch.round();
        if !rounded.is_finite() || !(0.0..=127.0).contains(&rounded) {
            return Err(NoteError::Pitch(pitch));
        }
        if !velocity.is_finite() || !(0.0..=1.0).contains(&velocity) {
            return Err(NoteError::Velocity(velocity));
        }
        if !start_time.is_finite() || !duration.is_finite() || start_time < 0.0 || duration < 0.0
        {
            return Err(NoteError::Timing {
                start_time,
                duration,
            });
        }
        Ok(Self {
            pitch: rounded as u8,
            start_time,
            duration,
            velocity: velocity as f32,
        })
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Reject notes ending after `max_end_secs`.
    ///
    /// Rendering allocates up to the last note end, so untrusted notes are
    /// bounded before they reach the synthesizer.
    pub fn within(self, max_end_secs: f64) -> Result<Self, NoteError> {
        let end_time = self.end_time();
        if end_time > max_end_secs {
            return Err(NoteError::TooLong {
                end_time,
                max: max_end_secs,
            });
        }
        Ok(self)
    }

    pub fn frequency(&self) -> f32 {
        midi_to_frequency(self.pitch as f32)
    }
}

/// Fractional MIDI number for a frequency: `69 + 12·log2(f/440)`.
pub fn frequency_to_midi(hz: f32) -> f32 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Frequency in Hz of a (possibly fractional) MIDI number.
pub fn midi_to_frequency(midi: f32) -> f32 {
    440.0 * 2.0_f32.powf((midi - 69.0) / 12.0)
}

// ---------------------------------------------------------------------------
// NoteList
// ---------------------------------------------------------------------------

/// Notes ordered by onset time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteList(Vec<Note>);

impl NoteList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a list from notes in any order; equal onsets keep their
    /// relative order.
    pub fn from_notes(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Self(notes)
    }

    pub fn notes(&self) -> &[Note] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Note> {
        self.0.last()
    }

    /// Latest `start_time + duration` over all notes, `0.0` when empty.
    pub fn end_time(&self) -> f64 {
        self.0.iter().map(Note::end_time).fold(0.0, f64::max)
    }

    pub(crate) fn push_in_order(&mut self, note: Note) {
        debug_assert!(self.0.last().map_or(true, |l| l.start_time <= note.start_time));
        self.0.push(note);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Note> {
        self.0.last_mut()
    }
}

impl<'a> IntoIterator for &'a NoteList {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
