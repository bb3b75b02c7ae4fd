//! The session's single authoritative sync clock.
//!
//! The clock is a plain value: every operation takes the current
//! [`Instant`] explicitly, so it can be driven by a tokio interval in the
//! live session and by hand in tests.  While playing, [`SessionClock::sync`]
//! re-derives the position from the wall-clock anchor taken at the last
//! play/seek, so tick jitter never accumulates.

use std::time::Instant;

/// Transport position in seconds plus the playing flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionClock {
    position: f64,
    playing: bool,
    /// Wall-clock instant and position at the last (re)start.
    anchor: Option<(Instant, f64)>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            playing: false,
            anchor: None,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start advancing from the current position.  No-op while playing.
    pub fn play(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.anchor = Some((now, self.position));
    }

    /// Freeze at the position reached by `now`.
    pub fn pause(&mut self, now: Instant) {
        self.sync(now);
        self.playing = false;
        self.anchor = None;
    }

    /// Stop transport and return to zero.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
        self.anchor = None;
    }

    /// Jump to `position` (clamped at zero), keeping the play state.
    pub fn seek(&mut self, position: f64, now: Instant) {
        self.position = position.max(0.0);
        if self.playing {
            self.anchor = Some((now, self.position));
        }
    }

    /// Re-derive the position from the wall clock.
    pub fn sync(&mut self, now: Instant) {
        if let (true, Some((started, from))) = (self.playing, self.anchor) {
            self.position = from + now.saturating_duration_since(started).as_secs_f64();
        }
    }

    /// Advance by `dt` seconds of transport time while playing.
    ///
    /// Used when the clock is driven by rendered audio instead of the wall
    /// clock; the anchor moves with it so a later [`sync`](Self::sync) stays
    /// consistent.
    pub fn advance(&mut self, dt: f64) {
        if !self.playing || dt <= 0.0 {
            return;
        }
        self.position += dt;
        if let Some((_, from)) = self.anchor.as_mut() {
            *from += dt;
        }
    }
}
