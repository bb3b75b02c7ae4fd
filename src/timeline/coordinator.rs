//! Reconciles every placed object against the sync clock.
//!
//! ```text
//!                 start_time                start_time + duration
//!  ────────────────────┼─────────────────────────────┼──────────────▶ clock
//!   waiting: paused,   │  active: playing at         │  elapsed: paused at
//!   position 0         │  clock − start_time         │  the end if it ran off
//!                      │                             │  it, else where it was
//! ```
//!
//! Positions are tracked for every user and AI object whether or not its
//! track is muted; mute only clears [`PlayerState::audible`], so un-muting
//! resumes in sync.  Solo never changes scheduling.
//!
//! The backtrack is reconciled the same way, but when the clock runs past
//! its end while the transport is playing the coordinator reports
//! [`SyncReport::backtrack_finished`] so the caller can stop transport.

use std::collections::HashMap;

use uuid::Uuid;

use crate::timeline::clock::SessionClock;
use crate::timeline::track::{AudioObject, TrackRole, TrackSet};

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// The playback state of one object's player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    /// Seconds into the object's buffer.
    pub position: f64,
    pub playing: bool,
    /// `false` when the owning track is muted.
    pub audible: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: 0.0,
            playing: false,
            audible: true,
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncReport {
    /// Objects currently playing.
    pub active: usize,
    /// The clock passed the end of the backtrack while playing.
    pub backtrack_finished: bool,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Coordinator {
    players: HashMap<Uuid, PlayerState>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The player for object `id`, once it has been reconciled.
    pub fn player(&self, id: Uuid) -> Option<PlayerState> {
        self.players.get(&id).copied()
    }

    /// Bring every object's player in line with `clock`.
    pub fn sync(&mut self, clock: &SessionClock, tracks: &TrackSet) -> SyncReport {
        let now = clock.position();
        let transport = clock.is_playing();
        let mut report = SyncReport::default();

        for track in tracks.iter() {
            let audible = !track.muted;
            for object in &track.objects {
                let player = self.players.entry(object.id).or_default();
                *player = reconcile(*player, object, now, transport, audible);
                if player.playing {
                    report.active += 1;
                }
            }
        }

        if let Some(backtrack) = tracks.backtrack_object() {
            report.backtrack_finished = transport && now > backtrack.end_time();
        }

        // Players for objects cleared from the session.
        if self.players.len() > tracks.iter().map(|t| t.objects.len()).sum() {
            self.players.retain(|id, _| {
                TrackRole::ALL
                    .iter()
                    .any(|&role| tracks.get(role).object(*id).is_some())
            });
        }

        report
    }

    /// Force every player back to "not yet started" (seek / stop).
    pub fn reset(&mut self) {
        for player in self.players.values_mut() {
            player.position = 0.0;
            player.playing = false;
        }
    }
}

fn reconcile(
    prev: PlayerState,
    object: &AudioObject,
    now: f64,
    transport: bool,
    audible: bool,
) -> PlayerState {
    let relative = now - object.start_time;
    if relative < 0.0 {
        PlayerState {
            position: 0.0,
            playing: false,
            audible,
        }
    } else if relative <= object.duration {
        PlayerState {
            position: relative,
            playing: transport,
            audible,
        }
    } else {
        // A player that was running reached the end, however coarse the
        // tick that carried the clock past it.
        let position = if prev.playing {
            object.duration
        } else {
            prev.position
        };
        PlayerState {
            position,
            playing: false,
            audible,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::PcmBuffer;
    use std::time::Instant;

    const RATE: u32 = 100;

    fn object(start: f64, secs: f64) -> AudioObject {
        AudioObject::new(PcmBuffer::silence((secs * RATE as f64) as usize, RATE), start)
    }

    fn playing_clock() -> SessionClock {
        let mut clock = SessionClock::new();
        clock.play(Instant::now());
        clock
    }

    #[test]
    fn object_window_over_full_sweep() {
        let obj = object(10.0, 5.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::User, obj);
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();

        let mut last_active = 0.0;
        for _ in 0..200 {
            clock.advance(0.1);
            coordinator.sync(&clock, &tracks);
            let player = coordinator.player(id).expect("player");
            let now = clock.position();

            if now < 10.0 - 1e-9 {
                assert!(!player.playing, "at {now}");
                assert_eq!(player.position, 0.0);
            } else if now > 10.0 + 1e-9 && now < 15.0 - 1e-9 {
                assert!(player.playing, "at {now}");
                assert!((player.position - (now - 10.0)).abs() < 1e-9);
                assert!(player.position >= last_active);
                last_active = player.position;
            } else if now > 15.0 + 1e-9 {
                assert!(!player.playing, "at {now}");
                assert_eq!(player.position, 5.0, "at {now}");
            }
        }
    }

    #[test]
    fn jump_past_the_end_parks_player_at_end() {
        let obj = object(10.0, 5.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::User, obj);
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();

        clock.advance(14.9);
        coordinator.sync(&clock, &tracks);
        assert!(coordinator.player(id).expect("player").playing);

        // One late tick carries the clock well past the object.
        clock.advance(3.0);
        coordinator.sync(&clock, &tracks);
        let player = coordinator.player(id).expect("player");
        assert!(!player.playing);
        assert_eq!(player.position, 5.0);

        // Further ticks leave it there.
        clock.advance(1.0);
        coordinator.sync(&clock, &tracks);
        assert_eq!(coordinator.player(id).expect("player").position, 5.0);
    }

    #[test]
    fn paused_player_keeps_position_after_seek_past_end() {
        let obj = object(1.0, 2.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::Ai, obj);
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();

        clock.advance(2.5);
        coordinator.sync(&clock, &tracks);
        clock.pause(Instant::now());
        coordinator.sync(&clock, &tracks);
        clock.seek(7.5, Instant::now());
        coordinator.sync(&clock, &tracks);

        // Pausing re-reads the wall clock, so allow for the test's runtime.
        let player = coordinator.player(id).expect("player");
        assert!(!player.playing);
        assert!((player.position - 1.5).abs() < 1e-3, "{}", player.position);
    }

    #[test]
    fn paused_transport_holds_objects() {
        let obj = object(0.0, 5.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::User, obj);
        let mut coordinator = Coordinator::new();

        let mut clock = SessionClock::new();
        clock.seek(2.0, Instant::now());
        coordinator.sync(&clock, &tracks);

        let player = coordinator.player(id).expect("player");
        assert!(!player.playing);
        assert!((player.position - 2.0).abs() < 1e-9);
    }

    #[test]
    fn mute_keeps_position_tracking() {
        let obj = object(0.0, 5.0);
        let id = obj.id;
        let tracks = TrackSet::default()
            .with_object(TrackRole::Ai, obj)
            .map(TrackRole::Ai, |t| t.with_muted(true));
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();
        clock.advance(3.0);

        coordinator.sync(&clock, &tracks);
        let player = coordinator.player(id).expect("player");
        assert!(player.playing);
        assert!(!player.audible);
        assert!((player.position - 3.0).abs() < 1e-9);

        let unmuted = tracks.map(TrackRole::Ai, |t| t.with_muted(false));
        coordinator.sync(&clock, &unmuted);
        assert!(coordinator.player(id).expect("player").audible);
    }

    #[test]
    fn reset_returns_every_player_to_start() {
        let obj = object(0.0, 5.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::User, obj);
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();
        clock.advance(2.0);
        coordinator.sync(&clock, &tracks);

        coordinator.reset();
        let player = coordinator.player(id).expect("player");
        assert_eq!(player.position, 0.0);
        assert!(!player.playing);
    }

    #[test]
    fn backtrack_finish_is_reported() {
        let tracks = TrackSet::default().with_object(TrackRole::Backtrack, object(0.0, 3.0));
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();

        clock.advance(2.9);
        assert!(!coordinator.sync(&clock, &tracks).backtrack_finished);
        clock.advance(0.2);
        assert!(coordinator.sync(&clock, &tracks).backtrack_finished);

        clock.stop();
        assert!(!coordinator.sync(&clock, &tracks).backtrack_finished);
    }

    #[test]
    fn active_count_spans_tracks() {
        let tracks = TrackSet::default()
            .with_object(TrackRole::Backtrack, object(0.0, 30.0))
            .with_object(TrackRole::User, object(1.0, 2.0))
            .with_object(TrackRole::Ai, object(10.0, 2.0));
        let mut coordinator = Coordinator::new();
        let mut clock = playing_clock();
        clock.advance(1.5);
        assert_eq!(coordinator.sync(&clock, &tracks).active, 2);
    }

    #[test]
    fn cleared_objects_drop_their_players() {
        let obj = object(0.0, 1.0);
        let id = obj.id;
        let tracks = TrackSet::default().with_object(TrackRole::User, obj);
        let mut coordinator = Coordinator::new();
        coordinator.sync(&SessionClock::new(), &tracks);
        assert!(coordinator.player(id).is_some());

        coordinator.sync(&SessionClock::new(), &TrackSet::default());
        assert!(coordinator.player(id).is_none());
    }
}
