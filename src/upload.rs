//! Backtrack upload: decode, limit check, tempo and session-rate conversion.
//!
//! ```text
//! bytes ──decode_wav──▶ PcmBuffer ──duration ≤ max?──▶ mono @ session rate ──▶ Backtrack
//!   │                                                      └─ estimate_bpm (fallback: default)
//!   └─ decode failed ──probe_duration──▶ duration ≤ max? ──▶ UploadError::Decode
//!                                          └─ too long ──▶ UploadError::TooLong
//! ```
//!
//! A rejected upload never touches session state; callers only place the
//! returned [`Backtrack`] on success.

use std::path::Path;

use thiserror::Error;

use crate::audio::pcm::PcmBuffer;
use crate::audio::resample::{mix_planar, resample, ResampleError};
use crate::audio::tempo::estimate_bpm;
use crate::audio::wav::{decode_wav, probe_duration, WavError};
use crate::config::SessionConfig;

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode audio: {0}")]
    Decode(#[from] WavError),

    #[error("could not convert to the session rate: {0}")]
    Resample(#[from] ResampleError),

    #[error("file too long ({duration:.1}s); the maximum jam length is {} minutes", .max / 60.0)]
    TooLong { duration: f64, max: f64 },
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// What the session needs to know about a backing track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktrackMetadata {
    pub bpm: u32,
    pub duration: f64,
    /// `false` when the tempo is the configured default, not a detection.
    pub bpm_detected: bool,
    /// `false` when only the container header could be read.
    pub decoded: bool,
}

/// A decoded backtrack ready to be placed at time zero.
#[derive(Debug, Clone)]
pub struct Backtrack {
    /// Display name: the upload's file stem.
    pub name: String,
    /// Mono audio at the session rate.
    pub buffer: PcmBuffer,
    pub metadata: BacktrackMetadata,
}

// ---------------------------------------------------------------------------
// BacktrackLoader
// ---------------------------------------------------------------------------

pub struct BacktrackLoader {
    sample_rate: u32,
    max_duration_secs: f64,
    default_bpm: u32,
}

impl BacktrackLoader {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            max_duration_secs: config.max_duration_secs,
            default_bpm: config.default_bpm,
        }
    }

    /// Read and load the WAV file at `path`.
    pub fn load_file(&self, path: &Path) -> Result<Backtrack, UploadError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Backtrack".to_string());
        self.load(name, &bytes)
    }

    /// Decode `bytes` into a session-ready backtrack called `name`.
    pub fn load(&self, name: impl Into<String>, bytes: &[u8]) -> Result<Backtrack, UploadError> {
        let name = name.into();
        let decoded = match decode_wav(bytes) {
            Ok(buffer) => buffer,
            Err(e) => {
                // Enforce the limit on whatever duration the header gives.
                if let Ok(duration) = probe_duration(bytes) {
                    self.check_duration(duration)?;
                }
                log::warn!("upload: {name:?} could not be decoded: {e}");
                return Err(e.into());
            }
        };

        let duration = decoded.duration_secs();
        self.check_duration(duration)?;

        let channels: Vec<&[f32]> = (0..decoded.num_channels())
            .map(|c| decoded.channel(c))
            .collect();
        let mono = mix_planar(&channels);
        let (bpm, bpm_detected) = self.tempo(&mono, decoded.sample_rate());
        let samples = resample(&mono, decoded.sample_rate(), self.sample_rate)?;

        log::info!(
            "upload: {name:?} {duration:.2}s @ {} Hz, {bpm} BPM{}",
            decoded.sample_rate(),
            if bpm_detected { "" } else { " (default)" }
        );

        Ok(Backtrack {
            name,
            buffer: PcmBuffer::mono(samples, self.sample_rate),
            metadata: BacktrackMetadata {
                bpm,
                duration,
                bpm_detected,
                decoded: true,
            },
        })
    }

    /// Metadata only.  Falls back to the header duration and the default
    /// tempo when the sample data cannot be decoded.
    pub fn inspect(&self, bytes: &[u8]) -> Result<BacktrackMetadata, UploadError> {
        match decode_wav(bytes) {
            Ok(buffer) => {
                let duration = buffer.duration_secs();
                self.check_duration(duration)?;
                let channels: Vec<&[f32]> = (0..buffer.num_channels())
                    .map(|c| buffer.channel(c))
                    .collect();
                let (bpm, bpm_detected) = self.tempo(&mix_planar(&channels), buffer.sample_rate());
                Ok(BacktrackMetadata {
                    bpm,
                    duration,
                    bpm_detected,
                    decoded: true,
                })
            }
            Err(e) => {
                log::warn!("upload: decode failed ({e}), reading header only");
                let duration = probe_duration(bytes)?;
                self.check_duration(duration)?;
                Ok(BacktrackMetadata {
                    bpm: self.default_bpm,
                    duration,
                    bpm_detected: false,
                    decoded: false,
                })
            }
        }
    }

    fn check_duration(&self, duration: f64) -> Result<(), UploadError> {
        if duration > self.max_duration_secs {
            log::warn!(
                "upload: rejected {duration:.1}s file (limit {:.0}s)",
                self.max_duration_secs
            );
            return Err(UploadError::TooLong {
                duration,
                max: self.max_duration_secs,
            });
        }
        Ok(())
    }

    fn tempo(&self, mono: &[f32], rate: u32) -> (u32, bool) {
        match estimate_bpm(mono, rate) {
            Some(bpm) => (bpm, true),
            None => {
                log::debug!("upload: no tempo detected, using {}", self.default_bpm);
                (self.default_bpm, false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;
    use tempfile::tempdir;

    const RATE: u32 = 8_000;

    fn loader(max_secs: f64) -> BacktrackLoader {
        BacktrackLoader::from_config(&SessionConfig {
            sample_rate: 16_000,
            max_duration_secs: max_secs,
            default_bpm: 120,
            tick_ms: 100,
        })
    }

    fn clicks(bpm: f64, secs: f64) -> Vec<f32> {
        let total = (secs * RATE as f64) as usize;
        let period = (60.0 / bpm * RATE as f64).round() as usize;
        (0..total)
            .map(|i| {
                if i % period < 80 {
                    if i % 2 == 0 { 0.5 } else { -0.5 }
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn loads_stereo_wav_as_mono_at_session_rate() {
        let left = clicks(100.0, 6.0);
        let right = left.clone();
        let bytes = encode_wav(&PcmBuffer::from_channels(vec![left, right], RATE)).expect("encode");

        let track = loader(300.0).load("groove", &bytes).expect("load");
        assert_eq!(track.name, "groove");
        assert_eq!(track.buffer.num_channels(), 1);
        assert_eq!(track.buffer.sample_rate(), 16_000);
        assert!((track.buffer.duration_secs() - 6.0).abs() < 1e-3);
        assert!((track.metadata.duration - 6.0).abs() < 1e-9);
        assert_eq!(track.metadata.bpm, 100);
        assert!(track.metadata.bpm_detected);
    }

    #[test]
    fn silent_track_uses_default_bpm() {
        let bytes = encode_wav(&PcmBuffer::silence(RATE as usize * 3, RATE)).expect("encode");
        let meta = loader(300.0).inspect(&bytes).expect("inspect");
        assert_eq!(meta.bpm, 120);
        assert!(!meta.bpm_detected);
        assert!(meta.decoded);
    }

    #[test]
    fn too_long_is_rejected() {
        let bytes = encode_wav(&PcmBuffer::silence(RATE as usize * 3, RATE)).expect("encode");
        let err = loader(2.0).load("long", &bytes).unwrap_err();
        assert!(matches!(err, UploadError::TooLong { .. }));
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn truncated_data_falls_back_to_header() {
        // Header claims 4 s; only part of the data is present.
        let mut bytes = encode_wav(&PcmBuffer::silence(RATE as usize * 4, RATE)).expect("encode");
        bytes.truncate(44 + 1_001);

        let meta = loader(300.0).inspect(&bytes).expect("header fallback");
        assert!(!meta.decoded);
        assert_eq!(meta.bpm, 120);
        assert!((meta.duration - 4.0).abs() < 1e-9);

        assert!(matches!(
            loader(300.0).load("broken", &bytes),
            Err(UploadError::Decode(_))
        ));
        assert!(matches!(
            loader(1.0).load("broken", &bytes),
            Err(UploadError::TooLong { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = loader(300.0).inspect(b"not a wav file at all").unwrap_err();
        assert!(matches!(err, UploadError::Decode(_)));
    }

    #[test]
    fn load_file_names_by_stem() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("My Song.wav");
        let bytes = encode_wav(&PcmBuffer::silence(RATE as usize, RATE)).expect("encode");
        std::fs::write(&path, bytes).unwrap();

        let track = loader(300.0).load_file(&path).expect("load");
        assert_eq!(track.name, "My Song");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = loader(300.0)
            .load_file(Path::new("/definitely/not/here.wav"))
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
