//! Capture session: owns a capture stream and the worker thread that runs
//! the phrase detector over it.
//!
//! ```text
//! cpal callback ──AudioChunk (std mpsc)──▶ "phrase-detector" thread
//!                                            │ into_mono
//!                                            │ StreamResampler (device → session rate)
//!                                            │ PhraseDetector::push_frame
//!                                            ▼
//!                              Phrase (bounded tokio mpsc) ──▶ orchestrator
//! ```
//!
//! The phrase queue is bounded by `SegmenterConfig::queue_capacity` and uses
//! a **block** policy: when the orchestrator falls behind, the detector
//! thread waits in `blocking_send`.  The device callback is never blocked
//! because chunks reach the detector through an unbounded channel.
//!
//! The worker owns one resampler for the life of the stream, so the
//! detector's sample count, and with it every phrase timestamp, stays locked
//! to the device clock however the callbacks are sized.
//!
//! Stopping the session discards any phrase still being captured.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc as std_mpsc, Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
use crate::audio::resample::StreamResampler;
use crate::config::SegmenterConfig;
use crate::phrase::detector::{DetectorState, Phrase, PhraseDetector};

/// How often the worker re-checks the stop flag while no audio arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// A running capture stream plus its detector thread.
///
/// Create with [`CaptureSession::start`] (microphone) or
/// [`CaptureSession::from_source`] (any chunk source, e.g. tests or file
/// playback).  Stop with [`stop`](Self::stop); dropping the session stops it
/// as well.
pub struct CaptureSession {
    stream: Option<StreamHandle>,
    stop: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Start recording from `capture`.
    ///
    /// `origin_secs` is the session time at which the first captured sample
    /// is heard, normally the sync-clock position when recording starts.
    pub fn start(
        capture: &AudioCapture,
        config: &SegmenterConfig,
        session_rate: u32,
        origin_secs: f64,
        phrase_tx: mpsc::Sender<Phrase>,
    ) -> Result<Self, CaptureError> {
        let (chunk_tx, chunk_rx) = std_mpsc::channel::<AudioChunk>();
        let mut session =
            Self::spawn_worker(chunk_rx, config, session_rate, origin_secs, phrase_tx)?;
        session.stream = Some(capture.start(chunk_tx)?);

        log::info!(
            "capture: started ({} Hz, {} ch) at session time {:.2}s",
            capture.sample_rate(),
            capture.channels(),
            origin_secs
        );
        Ok(session)
    }

    /// Run the detector over chunks arriving on `chunks`.
    ///
    /// The worker exits when `chunks` disconnects or the session is stopped.
    pub fn from_source(
        chunks: std_mpsc::Receiver<AudioChunk>,
        config: &SegmenterConfig,
        session_rate: u32,
        origin_secs: f64,
        phrase_tx: mpsc::Sender<Phrase>,
    ) -> Result<Self, CaptureError> {
        Self::spawn_worker(chunks, config, session_rate, origin_secs, phrase_tx)
    }

    fn spawn_worker(
        chunks: std_mpsc::Receiver<AudioChunk>,
        config: &SegmenterConfig,
        session_rate: u32,
        origin_secs: f64,
        phrase_tx: mpsc::Sender<Phrase>,
    ) -> Result<Self, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let capturing = Arc::new(AtomicBool::new(false));

        let mut detector = PhraseDetector::new(config.clone(), session_rate, origin_secs);
        let stop_flag = Arc::clone(&stop);
        let capturing_flag = Arc::clone(&capturing);

        let worker = std::thread::Builder::new()
            .name("phrase-detector".into())
            .spawn(move || {
                let mut resampler: Option<StreamResampler> = None;
                let mut last_state = detector.state();
                loop {
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    let chunk = match chunks.recv_timeout(POLL_INTERVAL) {
                        Ok(chunk) => chunk,
                        Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                    };
                    // A stop request wins over audio already queued.
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }

                    let Some(frame) = to_session_rate(chunk, session_rate, &mut resampler) else {
                        continue;
                    };
                    let finalized = detector.push_frame(frame);
                    let state = detector.state();
                    if state != last_state {
                        log::debug!("capture: detector {} -> {}", last_state.label(), state.label());
                        last_state = state;
                    }
                    capturing_flag.store(state == DetectorState::Capturing, Ordering::Release);

                    if let Some(phrase) = finalized {
                        if phrase_tx.blocking_send(phrase).is_err() {
                            log::warn!("capture: phrase queue closed, stopping detector");
                            break;
                        }
                    }
                }
                detector.cancel();
                capturing_flag.store(false, Ordering::Release);
                log::debug!("capture: detector thread exiting");
            })?;

        Ok(Self {
            stream: None,
            stop,
            capturing,
            worker: Some(worker),
        })
    }

    /// `true` while the detector is inside a phrase.
    pub fn is_capturing_phrase(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    /// Stop the stream and the detector, discarding any unfinished phrase.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Wait for the worker to drain its source without cancelling.
    ///
    /// Only meaningful for [`from_source`](Self::from_source) sessions whose
    /// sender has been dropped.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("capture: detector thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Dropping the stream closes the chunk channel.
        self.stream.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("capture: detector thread panicked");
            }
            log::info!("capture: stopped");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bring one chunk to mono at `session_rate`.
///
/// The resampler is created on the first chunk that needs one and rebuilt
/// only if the device rate changes.  Returns `None` when the chunk had to
/// be dropped.
fn to_session_rate(
    chunk: AudioChunk,
    session_rate: u32,
    resampler: &mut Option<StreamResampler>,
) -> Option<Vec<f32>> {
    let device_rate = chunk.sample_rate;
    let mono = chunk.into_mono();
    if device_rate == session_rate {
        return Some(mono);
    }

    if resampler.as_ref().map(StreamResampler::source_rate) != Some(device_rate) {
        match StreamResampler::new(device_rate, session_rate) {
            Ok(stream) => {
                log::debug!("capture: resampling {device_rate} Hz -> {session_rate} Hz");
                *resampler = Some(stream);
            }
            Err(e) => {
                log::error!("capture: {e}");
                return None;
            }
        }
    }

    match resampler.as_mut()?.process(&mono) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::error!("capture: dropping chunk: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    fn chunks(level: f32, secs: f64, rate: u32) -> Vec<AudioChunk> {
        let frame = (rate / 100) as usize;
        let count = (secs * 100.0).round() as usize;
        (0..count)
            .map(|_| {
                let samples = (0..frame)
                    .map(|j| if j % 2 == 0 { level } else { -level })
                    .collect();
                AudioChunk::mono(samples, rate)
            })
            .collect()
    }

    /// `secs` of silence, 2 s of a 440 Hz tone, then 1.2 s of silence, cut
    /// into `frames`-sized device chunks.
    fn tone_phrase(rate: u32, silence_secs: f64, frames: usize) -> Vec<AudioChunk> {
        let lead = (silence_secs * rate as f64).round() as usize;
        let loud = 2 * rate as usize;
        let tail = (1.2 * rate as f64).round() as usize;
        let signal: Vec<f32> = (0..lead + loud + tail)
            .map(|i| {
                if (lead..lead + loud).contains(&i) {
                    let t = (i - lead) as f32 / rate as f32;
                    (std::f32::consts::TAU * 440.0 * t).sin() * 0.3
                } else {
                    0.0
                }
            })
            .collect();
        signal
            .chunks(frames)
            .map(|c| AudioChunk::mono(c.to_vec(), rate))
            .collect()
    }

    fn phrase_input(rate: u32) -> Vec<AudioChunk> {
        let mut input = chunks(0.0, 1.0, rate);
        input.extend(chunks(0.3, 2.0, rate));
        input.extend(chunks(0.0, 1.2, rate));
        input
    }

    #[test]
    fn emits_phrase_from_source() {
        let (chunk_tx, chunk_rx) = std_mpsc::channel();
        let (phrase_tx, mut phrase_rx) = mpsc::channel(4);
        let session = CaptureSession::from_source(
            chunk_rx,
            &SegmenterConfig::default(),
            RATE,
            10.0,
            phrase_tx,
        )
        .expect("worker");

        for chunk in phrase_input(RATE) {
            chunk_tx.send(chunk).unwrap();
        }
        drop(chunk_tx);
        session.join();

        let phrase = phrase_rx.try_recv().expect("one phrase");
        assert!((phrase.start_time - 10.8).abs() < 1e-6, "{}", phrase.start_time);
        assert_eq!(phrase.buffer.sample_rate(), RATE);
        assert!(phrase_rx.try_recv().is_err());
    }

    #[test]
    fn chunks_are_converted_to_session_rate() {
        let (chunk_tx, chunk_rx) = std_mpsc::channel();
        let (phrase_tx, mut phrase_rx) = mpsc::channel(4);
        let session =
            CaptureSession::from_source(chunk_rx, &SegmenterConfig::default(), RATE, 0.0, phrase_tx)
                .expect("worker");

        for chunk in tone_phrase(16_000, 1.0, 160) {
            chunk_tx.send(chunk).unwrap();
        }
        drop(chunk_tx);
        session.join();

        let phrase = phrase_rx.try_recv().expect("one phrase");
        assert_eq!(phrase.buffer.sample_rate(), RATE);
        assert!((phrase.melodic_secs - 2.0).abs() < 0.05, "{}", phrase.melodic_secs);
        assert!((phrase.onset_time - 1.0).abs() < 0.05, "{}", phrase.onset_time);
    }

    #[test]
    fn onset_stays_on_the_device_clock_over_minutes() {
        let (chunk_tx, chunk_rx) = std_mpsc::channel();
        let (phrase_tx, mut phrase_rx) = mpsc::channel(4);
        let session = CaptureSession::from_source(
            chunk_rx,
            &SegmenterConfig::default(),
            44_100,
            0.0,
            phrase_tx,
        )
        .expect("worker");

        // Two minutes of 48 kHz device callbacks before the player comes in.
        for chunk in tone_phrase(48_000, 120.0, 512) {
            chunk_tx.send(chunk).unwrap();
        }
        drop(chunk_tx);
        session.join();

        let phrase = phrase_rx.try_recv().expect("one phrase");
        assert_eq!(phrase.buffer.sample_rate(), 44_100);
        assert!(
            (phrase.onset_time - 120.0).abs() < 0.06,
            "onset at {}s",
            phrase.onset_time
        );
        assert!((phrase.start_time - (phrase.onset_time - 0.2)).abs() < 1e-6);
        assert!((phrase.melodic_secs - 2.0).abs() < 0.1, "{}", phrase.melodic_secs);
    }

    #[test]
    fn stop_mid_phrase_emits_nothing() {
        let (chunk_tx, chunk_rx) = std_mpsc::channel();
        let (phrase_tx, mut phrase_rx) = mpsc::channel(4);
        let session =
            CaptureSession::from_source(chunk_rx, &SegmenterConfig::default(), RATE, 0.0, phrase_tx)
                .expect("worker");

        for chunk in chunks(0.3, 2.0, RATE) {
            chunk_tx.send(chunk).unwrap();
        }
        // Sender stays alive: only stop() can end the worker here.
        session.stop();

        for chunk in chunks(0.0, 1.2, RATE) {
            let _ = chunk_tx.send(chunk);
        }
        assert!(phrase_rx.try_recv().is_err());
    }

    #[test]
    fn closed_phrase_queue_stops_worker() {
        let (chunk_tx, chunk_rx) = std_mpsc::channel();
        let (phrase_tx, phrase_rx) = mpsc::channel(1);
        drop(phrase_rx);
        let session =
            CaptureSession::from_source(chunk_rx, &SegmenterConfig::default(), RATE, 0.0, phrase_tx)
                .expect("worker");

        for chunk in phrase_input(RATE) {
            chunk_tx.send(chunk).unwrap();
        }
        // Worker exits on the failed send even though the source is open.
        session.join();
        drop(chunk_tx);
    }
}
