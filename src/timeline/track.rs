//! Tracks and the audio objects placed on them.
//!
//! Everything here is a value type.  Updates return a new [`TrackSet`]
//! rather than mutating in place, so a session can swap the whole set under
//! one lock without read-modify-write races between the capture path, the
//! clock tick and late-arriving responses.  Sample data sits behind an
//! `Arc`, so cloning a track set never copies audio.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::pcm::PcmBuffer;
use crate::midi::NoteList;

// ---------------------------------------------------------------------------
// AudioObject
// ---------------------------------------------------------------------------

/// One immutable audio region on a track's timeline.
#[derive(Debug, Clone)]
pub struct AudioObject {
    pub id: Uuid,
    pub buffer: Arc<PcmBuffer>,
    /// Absolute session time of the first sample.
    pub start_time: f64,
    pub duration: f64,
    /// The user phrase an AI reply answers.
    pub source_segment_id: Option<Uuid>,
    /// Notes this object was extracted to or synthesized from.
    pub notes: Option<NoteList>,
}

impl AudioObject {
    /// Place `buffer` at `start_time`; the duration is the buffer's.
    pub fn new(buffer: PcmBuffer, start_time: f64) -> Self {
        let duration = buffer.duration_secs();
        Self {
            id: Uuid::new_v4(),
            buffer: Arc::new(buffer),
            start_time,
            duration,
            source_segment_id: None,
            notes: None,
        }
    }

    pub fn with_source(mut self, segment_id: Uuid) -> Self {
        self.source_segment_id = Some(segment_id);
        self
    }

    pub fn with_notes(mut self, notes: NoteList) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

// ---------------------------------------------------------------------------
// TrackRole
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Backtrack,
    User,
    Ai,
}

impl TrackRole {
    pub const ALL: [TrackRole; 3] = [TrackRole::Backtrack, TrackRole::User, TrackRole::Ai];

    pub fn default_name(&self) -> &'static str {
        match self {
            TrackRole::Backtrack => "Original Backtrack",
            TrackRole::User => "My Improvisation",
            TrackRole::Ai => "AI Accompaniment",
        }
    }

    pub fn default_gain(&self) -> f32 {
        match self {
            TrackRole::User => 1.0,
            TrackRole::Backtrack | TrackRole::Ai => 0.8,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackRole::Backtrack => "backtrack",
            TrackRole::User => "user",
            TrackRole::Ai => "ai",
        }
    }
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Track {
    pub role: TrackRole,
    pub name: String,
    pub muted: bool,
    pub solo: bool,
    /// Linear gain in `[0, 1]`.
    pub gain: f32,
    /// Display label of the voice used for synthesized material.
    pub instrument: Option<String>,
    /// Placed objects in append order.  The backtrack holds at most one.
    pub objects: Vec<AudioObject>,
}

impl Track {
    pub fn new(role: TrackRole) -> Self {
        Self {
            role,
            name: role.default_name().to_string(),
            muted: false,
            solo: false,
            gain: role.default_gain(),
            instrument: (role == TrackRole::Ai).then(|| "Grand Piano".to_string()),
            objects: Vec::new(),
        }
    }

    /// Append `object`; on the backtrack it replaces the existing one.
    pub fn with_object(&self, object: AudioObject) -> Self {
        let mut next = self.clone();
        if self.role == TrackRole::Backtrack {
            next.objects = vec![object];
        } else {
            if let Some(last) = self.objects.last() {
                if object.start_time < last.end_time() {
                    log::debug!(
                        "track {}: object at {:.2}s overlaps previous ending {:.2}s",
                        self.role,
                        object.start_time,
                        last.end_time()
                    );
                }
            }
            next.objects.push(object);
        }
        next
    }

    pub fn with_muted(&self, muted: bool) -> Self {
        Self {
            muted,
            ..self.clone()
        }
    }

    pub fn with_solo(&self, solo: bool) -> Self {
        Self {
            solo,
            ..self.clone()
        }
    }

    pub fn with_gain(&self, gain: f32) -> Self {
        Self {
            gain: gain.clamp(0.0, 1.0),
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_instrument(&self, instrument: Option<String>) -> Self {
        Self {
            instrument,
            ..self.clone()
        }
    }

    /// End of the last placed object, `0.0` when empty.
    pub fn end_time(&self) -> f64 {
        self.objects.iter().map(AudioObject::end_time).fold(0.0, f64::max)
    }

    pub fn object(&self, id: Uuid) -> Option<&AudioObject> {
        self.objects.iter().find(|o| o.id == id)
    }
}

// ---------------------------------------------------------------------------
// TrackSet
// ---------------------------------------------------------------------------

/// The three fixed tracks of a session.
#[derive(Debug, Clone)]
pub struct TrackSet {
    backtrack: Track,
    user: Track,
    ai: Track,
}

impl Default for TrackSet {
    fn default() -> Self {
        Self {
            backtrack: Track::new(TrackRole::Backtrack),
            user: Track::new(TrackRole::User),
            ai: Track::new(TrackRole::Ai),
        }
    }
}

impl TrackSet {
    pub fn get(&self, role: TrackRole) -> &Track {
        match role {
            TrackRole::Backtrack => &self.backtrack,
            TrackRole::User => &self.user,
            TrackRole::Ai => &self.ai,
        }
    }

    /// A new set with the track for `role` replaced by `f(track)`.
    pub fn map(&self, role: TrackRole, f: impl FnOnce(&Track) -> Track) -> Self {
        let mut next = self.clone();
        let updated = f(self.get(role));
        debug_assert_eq!(updated.role, role);
        match role {
            TrackRole::Backtrack => next.backtrack = updated,
            TrackRole::User => next.user = updated,
            TrackRole::Ai => next.ai = updated,
        }
        next
    }

    pub fn with_object(&self, role: TrackRole, object: AudioObject) -> Self {
        self.map(role, |track| track.with_object(object))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        [&self.backtrack, &self.user, &self.ai].into_iter()
    }

    pub fn any_solo(&self) -> bool {
        self.iter().any(|t| t.solo)
    }

    /// The uploaded backing track, if any.
    pub fn backtrack_object(&self) -> Option<&AudioObject> {
        self.backtrack.objects.first()
    }

    /// Latest object end across all tracks.
    pub fn end_time(&self) -> f64 {
        self.iter().map(Track::end_time).fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn object(start: f64, secs: f64) -> AudioObject {
        AudioObject::new(PcmBuffer::silence((secs * 1_000.0) as usize, 1_000), start)
    }

    #[test]
    fn defaults_match_session_layout() {
        let tracks = TrackSet::default();
        let backtrack = tracks.get(TrackRole::Backtrack);
        assert_eq!(backtrack.name, "Original Backtrack");
        assert!((backtrack.gain - 0.8).abs() < 1e-6);

        let user = tracks.get(TrackRole::User);
        assert_eq!(user.name, "My Improvisation");
        assert!((user.gain - 1.0).abs() < 1e-6);

        let ai = tracks.get(TrackRole::Ai);
        assert_eq!(ai.name, "AI Accompaniment");
        assert_eq!(ai.instrument.as_deref(), Some("Grand Piano"));
        assert!(tracks.iter().all(|t| t.objects.is_empty() && !t.muted && !t.solo));
    }

    #[test]
    fn object_duration_comes_from_buffer() {
        let obj = object(2.0, 1.5);
        assert!((obj.duration - 1.5).abs() < 1e-9);
        assert!((obj.end_time() - 3.5).abs() < 1e-9);
        assert!(obj.source_segment_id.is_none());
    }

    #[test]
    fn with_object_leaves_original_untouched() {
        let before = TrackSet::default();
        let after = before.with_object(TrackRole::User, object(0.0, 1.0));
        assert!(before.get(TrackRole::User).objects.is_empty());
        assert_eq!(after.get(TrackRole::User).objects.len(), 1);
    }

    #[test]
    fn objects_keep_append_order() {
        let tracks = TrackSet::default()
            .with_object(TrackRole::User, object(0.0, 1.0))
            .with_object(TrackRole::User, object(2.0, 1.0));
        let starts: Vec<f64> = tracks
            .get(TrackRole::User)
            .objects
            .iter()
            .map(|o| o.start_time)
            .collect();
        assert_eq!(starts, vec![0.0, 2.0]);
    }

    #[test]
    fn backtrack_holds_one_object() {
        let tracks = TrackSet::default()
            .with_object(TrackRole::Backtrack, object(0.0, 10.0))
            .with_object(TrackRole::Backtrack, object(0.0, 20.0));
        assert_eq!(tracks.get(TrackRole::Backtrack).objects.len(), 1);
        let bt = tracks.backtrack_object().expect("backtrack");
        assert!((bt.duration - 20.0).abs() < 1e-9);
    }

    #[test]
    fn updates_by_role() {
        let tracks = TrackSet::default()
            .map(TrackRole::Ai, |t| {
                t.with_muted(true)
                    .with_gain(1.5)
                    .with_instrument(Some("Rhodes".into()))
            })
            .map(TrackRole::User, |t| t.with_solo(true).with_name("Lead"));
        let ai = tracks.get(TrackRole::Ai);
        assert!(ai.muted);
        assert_eq!(ai.gain, 1.0);
        assert_eq!(ai.instrument.as_deref(), Some("Rhodes"));
        assert_eq!(tracks.get(TrackRole::User).name, "Lead");
        assert!(tracks.any_solo());
        assert!(!tracks.get(TrackRole::Backtrack).muted);
    }

    #[test]
    fn source_link_and_lookup() {
        let user = object(0.0, 1.0);
        let reply = object(0.5, 1.0).with_source(user.id);
        let reply_id = reply.id;
        let tracks = TrackSet::default()
            .with_object(TrackRole::User, user.clone())
            .with_object(TrackRole::Ai, reply);
        let found = tracks.get(TrackRole::Ai).object(reply_id).expect("reply");
        assert_eq!(found.source_segment_id, Some(user.id));
        assert!((tracks.end_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn clones_share_sample_data() {
        let tracks = TrackSet::default().with_object(TrackRole::User, object(0.0, 1.0));
        let copy = tracks.clone();
        let a = &tracks.get(TrackRole::User).objects[0].buffer;
        let b = &copy.get(TrackRole::User).objects[0].buffer;
        assert!(Arc::ptr_eq(a, b));
    }
}
