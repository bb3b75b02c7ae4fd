//! JSON bodies exchanged with the response service.
//!
//! Request:  `{"project_id": "...", "bpm": 120, "user_notes": [Note, ...]}`
//! Response: `{"ai_notes": [Note, ...]}`
//!
//! where a note is `{"pitch", "start_time", "duration", "velocity"}`.
//! Incoming notes are read as plain numbers and only become [`Note`]s after
//! range validation.

use serde::{Deserialize, Serialize};

use crate::midi::{Note, NoteList};
use crate::response::client::ResponseError;

/// A note as it travels over the wire, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireNote {
    pub pitch: f64,
    pub start_time: f64,
    pub duration: f64,
    pub velocity: f64,
}

impl From<&Note> for WireNote {
    fn from(note: &Note) -> Self {
        Self {
            pitch: note.pitch as f64,
            start_time: note.start_time,
            duration: note.duration,
            velocity: note.velocity as f64,
        }
    }
}

impl TryFrom<WireNote> for Note {
    type Error = crate::midi::NoteError;

    fn try_from(wire: WireNote) -> Result<Self, Self::Error> {
        Note::validated(wire.pitch, wire.start_time, wire.duration, wire.velocity)
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseRequest<'a> {
    pub project_id: &'a str,
    pub bpm: u32,
    pub user_notes: Vec<WireNote>,
}

impl<'a> ResponseRequest<'a> {
    pub fn new(project_id: &'a str, bpm: u32, notes: &NoteList) -> Self {
        Self {
            project_id,
            bpm,
            user_notes: notes.iter().map(WireNote::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    pub ai_notes: Vec<WireNote>,
}

impl ResponseBody {
    /// Validate every note and bound the reply to `max_end_secs`; an empty
    /// reply is an error.
    pub fn into_notes(self, max_end_secs: f64) -> Result<NoteList, ResponseError> {
        if self.ai_notes.is_empty() {
            return Err(ResponseError::EmptyResponse);
        }
        let notes = self
            .ai_notes
            .into_iter()
            .map(|wire| Note::try_from(wire).and_then(|note| note.within(max_end_secs)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NoteList::from_notes(notes))
    }
}
