//! Audio plumbing: capture, PCM buffers, WAV encoding, resampling, pitch and
//! tempo analysis.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix → StreamResampler
//!           → RingBuffer pre-roll → phrase detector → PcmBuffer
//!
//! WAV upload → decode_wav → PcmBuffer → estimate_bpm
//! PcmBuffer  → encode_wav → 16-bit PCM bytes
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//! use jam_session::audio::{AudioCapture, AudioChunk};
//!
//! let (tx, rx) = mpsc::channel::<AudioChunk>();
//! let capture = AudioCapture::new().unwrap();
//! let _handle = capture.start(tx).unwrap(); // drops handle → stops stream
//!
//! while let Ok(chunk) = rx.recv() {
//!     println!("received {} samples @ {}Hz", chunk.samples.len(), chunk.sample_rate);
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod pcm;
pub mod pitch;
pub mod resample;
pub mod tempo;
pub mod wav;

pub use buffer::RingBuffer;
pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use pcm::{concatenate, normalize_peak, peak, rms, PcmBuffer};
pub use pitch::YinDetector;
pub use resample::{downmix_to_mono, mix_planar, resample, ResampleError, StreamResampler};
pub use tempo::estimate_bpm;
pub use wav::{decode_wav, encode_wav, probe_duration, WavError};
