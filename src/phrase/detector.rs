//! Streaming phrase detector.
//!
//! ```text
//!            rms > threshold
//!   Idle ─────────────────────▶ Capturing
//!    ▲                              │  every frame appended,
//!    │                              │  loud frames refresh last_loud
//!    └──────────────────────────────┘
//!       now − last_loud > silence_delay  (finalize: emit or discard)
//! ```
//!
//! Time is counted in samples from the moment the detector was created, so
//! timestamps are exact and independent of wall-clock jitter.  `origin_secs`
//! places that moment on the session timeline.
//!
//! While idle, frames flow through a pre-roll ring.  On onset the ring's
//! contents become the head of the phrase and the phrase start is moved back
//! by however much audio the ring held, so the attack that preceded the
//! threshold crossing is kept.  The ring is cleared when a phrase ends, which
//! keeps the next phrase from reaching back into the previous one.

use crate::audio::buffer::RingBuffer;
use crate::audio::pcm::{concatenate, rms, PcmBuffer};
use crate::config::SegmenterConfig;

// ---------------------------------------------------------------------------
// Phrase
// ---------------------------------------------------------------------------

/// A finalized phrase ready for the dialogue pipeline.
#[derive(Debug, Clone)]
pub struct Phrase {
    /// Pre-roll, melodic part and the confirming trailing silence.
    pub buffer: PcmBuffer,
    /// Absolute session time of the first sample in `buffer`.
    pub start_time: f64,
    /// Absolute session time of the frame that crossed the threshold.
    pub onset_time: f64,
    /// Length of the phrase excluding pre-roll and trailing silence.
    pub melodic_secs: f64,
}

// ---------------------------------------------------------------------------
// DetectorState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorState {
    Idle,
    Capturing,
}

impl DetectorState {
    pub fn label(&self) -> &'static str {
        match self {
            DetectorState::Idle => "Idle",
            DetectorState::Capturing => "Capturing",
        }
    }
}

// ---------------------------------------------------------------------------
// PhraseDetector
// ---------------------------------------------------------------------------

/// Energy-gated phrase segmenter for one mono capture stream.
pub struct PhraseDetector {
    config: SegmenterConfig,
    sample_rate: u32,
    origin_secs: f64,
    samples_seen: u64,
    state: DetectorState,
    pre_roll: RingBuffer<f32>,
    frames: Vec<Vec<f32>>,
    start_time: f64,
    onset_time: f64,
    last_loud: f64,
}

impl PhraseDetector {
    /// Create a detector for mono frames at `sample_rate`, whose first
    /// sample sits at `origin_secs` on the session timeline.
    pub fn new(config: SegmenterConfig, sample_rate: u32, origin_secs: f64) -> Self {
        let pre_roll_len = ((config.pre_roll_secs() * sample_rate as f64).round() as usize).max(1);
        Self {
            config,
            sample_rate,
            origin_secs,
            samples_seen: 0,
            state: DetectorState::Idle,
            pre_roll: RingBuffer::new(pre_roll_len),
            frames: Vec::new(),
            start_time: 0.0,
            onset_time: 0.0,
            last_loud: 0.0,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Session time at the end of everything processed so far.
    pub fn now(&self) -> f64 {
        self.time_at(self.samples_seen)
    }

    fn time_at(&self, samples: u64) -> f64 {
        self.origin_secs + samples as f64 / self.sample_rate as f64
    }

    /// Feed the next frame in arrival order.
    ///
    /// Returns the finalized phrase when this frame confirms a phrase end
    /// and the phrase is long enough to keep.
    pub fn push_frame(&mut self, frame: Vec<f32>) -> Option<Phrase> {
        if frame.is_empty() {
            return None;
        }

        let frame_start = self.now();
        self.samples_seen += frame.len() as u64;
        let frame_end = self.now();
        let loud = rms(&frame) > self.config.energy_threshold;

        match self.state {
            DetectorState::Idle => {
                if loud {
                    self.begin_phrase(frame, frame_start, frame_end);
                } else {
                    self.pre_roll.push_slice(&frame);
                }
                None
            }
            DetectorState::Capturing => {
                self.frames.push(frame);
                if loud {
                    self.last_loud = frame_end;
                    None
                } else if frame_end - self.last_loud > self.config.silence_delay_secs() {
                    self.finalize(frame_end)
                } else {
                    None
                }
            }
        }
    }

    fn begin_phrase(&mut self, frame: Vec<f32>, frame_start: f64, frame_end: f64) {
        let held = self.pre_roll.duration_secs(self.sample_rate);

        let mut head = Vec::with_capacity(self.pre_roll.len());
        self.pre_roll.drain_into(&mut head);
        self.frames.clear();
        if !head.is_empty() {
            self.frames.push(head);
        }
        self.frames.push(frame);

        self.onset_time = frame_start;
        self.start_time = frame_start - held;
        self.last_loud = frame_end;
        self.state = DetectorState::Capturing;

        log::debug!(
            "detector: onset at {:.3}s (phrase starts {:.3}s)",
            self.onset_time,
            self.start_time
        );
    }

    fn finalize(&mut self, now: f64) -> Option<Phrase> {
        self.state = DetectorState::Idle;
        self.pre_roll.clear();
        let frames = std::mem::take(&mut self.frames);

        let melodic_secs = (now - self.onset_time) - self.config.silence_delay_secs();
        if melodic_secs < self.config.min_phrase_secs as f64 {
            log::debug!("detector: discarded {:.2}s burst", melodic_secs);
            return None;
        }

        let buffer = PcmBuffer::mono(concatenate(&frames), self.sample_rate);
        log::info!(
            "detector: phrase at {:.2}s ({:.2}s melodic, {:.2}s buffered)",
            self.start_time,
            melodic_secs,
            buffer.duration_secs()
        );

        Some(Phrase {
            buffer,
            start_time: self.start_time,
            onset_time: self.onset_time,
            melodic_secs,
        })
    }

    /// Abandon any in-progress phrase without emitting it.
    pub fn cancel(&mut self) {
        if self.state == DetectorState::Capturing {
            log::debug!("detector: in-progress phrase cancelled");
        }
        self.state = DetectorState::Idle;
        self.frames.clear();
        self.pre_roll.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
