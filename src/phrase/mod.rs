//! Phrase segmentation: turning a continuous capture stream (or a finished
//! recording) into discrete musical phrases.
//!
//! ```text
//! AudioChunk ──▶ CaptureSession ──▶ PhraseDetector ──▶ Phrase (bounded mpsc)
//!
//! PcmBuffer  ──▶ segment_buffer ──▶ Vec<AudioSegment>
//! ```

pub mod detector;
pub mod segment;
pub mod session;

pub use detector::{DetectorState, Phrase, PhraseDetector};
pub use segment::{segment_buffer, AudioSegment};
pub use session::CaptureSession;
