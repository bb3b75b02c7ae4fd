//! The shared timeline: sync clock, tracks of placed audio objects, the
//! coordinator that schedules them, and offline mixdown.
//!
//! ```text
//! SessionClock ──position──▶ Coordinator::sync(&TrackSet) ──▶ PlayerState per object
//!                                         │
//!                                         └─ backtrack finished ⇒ caller stops transport
//! ```

pub mod clock;
pub mod coordinator;
pub mod mix;
pub mod track;

pub use clock::SessionClock;
pub use coordinator::{Coordinator, PlayerState, SyncReport};
pub use mix::{effective_gain, mixdown};
pub use track::{AudioObject, Track, TrackRole, TrackSet};
