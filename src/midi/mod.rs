//! Symbolic side of the dialogue: notes, audio → note extraction, and
//! note → audio synthesis.
//!
//! ```text
//! phrase PcmBuffer ──NoteExtractor──▶ NoteList ──(response service)──▶ NoteList
//!                                                                         │
//!                        AI PcmBuffer ◀──NoteSynthesizer───────────────────┘
//! ```

pub mod extract;
pub mod note;
pub mod synth;

pub use extract::NoteExtractor;
pub use note::{frequency_to_midi, midi_to_frequency, Note, NoteError, NoteList};
pub use synth::NoteSynthesizer;
