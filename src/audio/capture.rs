//! Microphone input through `cpal`.
//!
//! ```text
//! device (f32 | i16 | u16) ──callback: to f32, copy──▶ AudioChunk (std mpsc)
//! ```
//!
//! The callback converts and forwards only; the receiving thread downmixes,
//! resamples and analyses, so the device thread never waits on the session.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use std::sync::mpsc;
use thiserror::Error;

use crate::audio::resample::downmix_to_mono;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One device buffer, converted to `f32` but otherwise untouched.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved frames.
    pub samples: Vec<f32>,
    /// Device rate in Hz.
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    /// A mono chunk, as produced by test sources and mono devices.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Mono samples at the device rate; mono chunks move through without
    /// copying.
    ///
    /// Rate conversion is left to the stream's `StreamResampler`, which
    /// carries state from one chunk to the next.
    pub fn into_mono(self) -> Vec<f32> {
        if self.channels > 1 {
            downmix_to_mono(&self.samples, self.channels)
        } else {
            self.samples
        }
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Keeps an input stream open; dropping it closes the stream, and with it
/// the sending side of the chunk channel.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// The capture device could not be opened or started.
///
/// None of these are fatal to a session: recording simply stays stopped.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("input sample format {0:?} is not supported")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn capture worker: {0}")]
    Worker(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// An opened input device and the stream format it will deliver.
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use jam_session::audio::{AudioCapture, AudioChunk};
///
/// let (tx, rx) = mpsc::channel::<AudioChunk>();
/// let mic = AudioCapture::with_device(None).unwrap();
/// let _handle = mic.start(tx).unwrap();
///
/// for chunk in rx.iter().take(10) {
///     println!("{} frames", chunk.samples.len() / chunk.channels as usize);
/// }
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    format: cpal::SampleFormat,
}

impl AudioCapture {
    /// Open the default input device of the default host.
    pub fn new() -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;
        Self::open(device)
    }

    /// Open the input device called `name`, or the default when `None`.
    pub fn with_device(name: Option<&str>) -> Result<Self, CaptureError> {
        let Some(name) = name else {
            return Self::new();
        };
        let mut devices = cpal::default_host().input_devices()?;
        match devices.find(|d| d.name().is_ok_and(|n| n == name)) {
            Some(device) => Self::open(device),
            None => {
                log::warn!(
                    "capture: no input named {name:?}; available: {:?}",
                    Self::input_device_names()
                );
                Err(CaptureError::DeviceNotFound(name.to_string()))
            }
        }
    }

    /// Names of every input device on the default host.
    pub fn input_device_names() -> Vec<String> {
        match cpal::default_host().input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                log::warn!("capture: cannot enumerate input devices: {e}");
                Vec::new()
            }
        }
    }

    fn open(device: cpal::Device) -> Result<Self, CaptureError> {
        let supported = device.default_input_config()?;
        let format = supported.sample_format();
        log::debug!(
            "capture: {:?} {} Hz, {} ch, {format:?}",
            device.name().unwrap_or_default(),
            supported.sample_rate().0,
            supported.channels()
        );
        Ok(Self {
            device,
            config: supported.into(),
            format,
        })
    }

    /// Open the stream and forward every device buffer to `tx` as `f32`.
    ///
    /// A dropped receiver is ignored here; the stream keeps running until
    /// the returned handle is dropped.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let stream = match self.format {
            cpal::SampleFormat::F32 => self.build::<f32>(tx)?,
            cpal::SampleFormat::I16 => self.build::<i16>(tx)?,
            cpal::SampleFormat::U16 => self.build::<u16>(tx)?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    fn build<T>(&self, tx: mpsc::Sender<AudioChunk>) -> Result<cpal::Stream, CaptureError>
    where
        T: cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        let sample_rate = self.sample_rate();
        let channels = self.channels();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|s| s.to_sample::<f32>()).collect();
                let _ = tx.send(AudioChunk {
                    samples,
                    sample_rate,
                    channels,
                });
            },
            |err: cpal::StreamError| log::error!("capture: stream error: {err}"),
            None,
        )?;
        Ok(stream)
    }

    /// Device sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
