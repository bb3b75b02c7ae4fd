//! jam-session: call-and-response improvisation.
//!
//! A player improvises over a backing track; every phrase they finish is
//! turned into notes, answered by a response service and placed back on the
//! timeline as synthesized audio, in time with the session clock.
//!
//! ```text
//! audio ──▶ phrase ──▶ pipeline ──▶ response
//!   ▲                     │
//!   │                     ├──▶ midi (extract / synth)
//!   │                     ▼
//! upload ──────────▶ timeline (clock, tracks, coordinator, mix)
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod midi;
pub mod phrase;
pub mod pipeline;
pub mod response;
pub mod timeline;
pub mod upload;
