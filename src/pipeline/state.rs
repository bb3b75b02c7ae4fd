//! Session state and the shared handle every task updates it through.
//!
//! [`SessionState`] is the single source of truth: tracks, dialogue history,
//! sync clock, tempo and capture status.  It is a value; nobody mutates it in
//! place.  [`SharedSession::update`] replaces the whole state with
//! `f(&previous)` under one lock, so the capture path, the clock tick and
//! late responses can interleave without lost updates.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::pcm::PcmBuffer;
use crate::pipeline::history::{DialogueHistory, DialogueRecord};
use crate::timeline::{AudioObject, SessionClock, TrackRole, TrackSet};

// ---------------------------------------------------------------------------
// RecordingState
// ---------------------------------------------------------------------------

/// Capture status shown alongside the transport.
///
/// ```text
/// Stopped ──start──▶ Listening ──onset──▶ Capturing
///    ▲                   ▲                    │
///    │                   └──phrase finalized──┘
///    └──────────── stop / capture error ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Stopped,
    /// Microphone open, waiting for an onset.
    Listening,
    /// A phrase is being accumulated.
    Capturing,
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        !matches!(self, RecordingState::Stopped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordingState::Stopped => "Stopped",
            RecordingState::Listening => "Listening",
            RecordingState::Capturing => "Capturing",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionState {
    pub tracks: TrackSet,
    pub history: DialogueHistory,
    pub clock: SessionClock,
    /// Tempo sent with every response request.
    pub bpm: u32,
    pub recording: RecordingState,
    /// Phrases whose reply is still being produced.
    pub pending_replies: usize,
    /// Most recent recoverable failure, for display.
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(bpm: u32) -> Self {
        Self {
            tracks: TrackSet::default(),
            history: DialogueHistory::new(),
            clock: SessionClock::new(),
            bpm,
            recording: RecordingState::Stopped,
            pending_replies: 0,
            last_error: None,
        }
    }

    pub fn with_object(&self, role: TrackRole, object: AudioObject) -> Self {
        Self {
            tracks: self.tracks.with_object(role, object),
            ..self.clone()
        }
    }

    pub fn with_record(&self, record: DialogueRecord) -> Self {
        Self {
            history: self.history.with_record(record),
            ..self.clone()
        }
    }

    pub fn with_error(&self, message: impl Into<String>) -> Self {
        Self {
            last_error: Some(message.into()),
            ..self.clone()
        }
    }

    /// Clear every track, the history and the clock, keeping `bpm` and the
    /// capture status.
    pub fn cleared(&self, bpm: u32) -> Self {
        Self {
            recording: self.recording,
            pending_replies: self.pending_replies,
            ..Self::new(bpm)
        }
    }

    /// Start a new jam over `buffer`: everything is cleared, then the
    /// backtrack is placed at zero under `name` and its tempo adopted.
    pub fn with_backtrack(&self, name: impl Into<String>, buffer: PcmBuffer, bpm: u32) -> Self {
        let name = name.into();
        let mut next = self
            .cleared(bpm)
            .with_object(TrackRole::Backtrack, AudioObject::new(buffer, 0.0));
        next.tracks = next
            .tracks
            .map(TrackRole::Backtrack, |t| t.with_name(name));
        next
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionState`].
///
/// Cheap to clone (`Arc` clone).  Never hold it across `.await`: every
/// accessor takes the lock for the duration of one closure.
#[derive(Debug, Clone)]
pub struct SharedSession(Arc<Mutex<SessionState>>);

impl SharedSession {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A panic inside `update` cannot leave a half-written state behind,
        // since the new value is swapped in only after `f` returns.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the state with `f(&current)` and return the new state.
    pub fn update(&self, f: impl FnOnce(&SessionState) -> SessionState) -> SessionState {
        let mut guard = self.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    /// Run `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.lock())
    }

    /// A full copy of the current state.  Sample data is shared, not copied.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
