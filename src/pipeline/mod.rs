//! Session pipeline: shared state, dialogue history and the orchestrator
//! that answers each finalized phrase.
//!
//! # Architecture
//!
//! ```text
//! CaptureSession ──Phrase (bounded mpsc)──▶ DialogueOrchestrator::run()  ← tokio task
//!                                                 │
//!                                                 ├─ append user object (sync)
//!                                                 └─ per phrase task:
//!                                                      extract → respond → synth
//!                                                      → append AI object + record
//!
//! SharedSession (Arc<Mutex<SessionState>>) ◀── clock tick loop, orchestrator, exports
//! ```

pub mod history;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use history::{DialogueHistory, DialogueRecord, HistoryError};
pub use runner::{DialogueError, DialogueOrchestrator, ReplyOutcome};
pub use state::{RecordingState, SessionState, SharedSession};
