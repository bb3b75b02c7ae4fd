//! Session settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every field carries `#[serde(default)]` at the struct level, so a partial
//! `settings.toml` only needs to name the values it overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SegmenterConfig
// ---------------------------------------------------------------------------

/// Tuning for the streaming phrase detector.
///
/// What counts as a "phrase" is policy, so every constant lives here instead
/// of in the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// RMS level a frame must exceed to count as sound.
    pub energy_threshold: f32,
    /// Audio retained before an onset so the attack transient survives.
    pub pre_roll_ms: u32,
    /// Silence after the last loud frame that confirms a phrase has ended.
    pub silence_delay_ms: u32,
    /// Phrases whose melodic part is shorter than this are discarded.
    pub min_phrase_secs: f32,
    /// Capacity of the finalized-phrase queue between detector and
    /// orchestrator.  The detector blocks when the queue is full.
    pub queue_capacity: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.005,
            pre_roll_ms: 200,
            silence_delay_ms: 1000,
            min_phrase_secs: 1.5,
            queue_capacity: 8,
        }
    }
}

impl SegmenterConfig {
    pub fn pre_roll_secs(&self) -> f64 {
        self.pre_roll_ms as f64 / 1000.0
    }

    pub fn silence_delay_secs(&self) -> f64 {
        self.silence_delay_ms as f64 / 1000.0
    }
}

// ---------------------------------------------------------------------------
// ExtractorConfig
// ---------------------------------------------------------------------------

/// Settings for the sliding-window audio → note extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Analysis window length in samples.
    pub window_size: usize,
    /// Distance between consecutive windows in samples.
    pub hop_size: usize,
    /// Same-pitch windows closer than this to the previous onset extend it.
    pub merge_window_secs: f64,
    /// Duration given to a freshly emitted note.
    pub default_note_secs: f64,
    /// Velocity given to every extracted note (0.0 – 1.0).
    pub default_velocity: f32,
    /// YIN absolute threshold on the cumulative mean normalised difference.
    pub yin_threshold: f32,
    /// Lowest frequency the pitch estimator reports.
    pub min_frequency_hz: f32,
    /// Highest frequency the pitch estimator reports.
    pub max_frequency_hz: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 1024,
            merge_window_secs: 0.2,
            default_note_secs: 0.1,
            default_velocity: 0.7,
            yin_threshold: 0.15,
            min_frequency_hz: 50.0,
            max_frequency_hz: 2000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SynthConfig
// ---------------------------------------------------------------------------

/// Voice parameters for the note → audio synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Output sample rate in Hz.  Must match the session rate.
    pub sample_rate: u32,
    /// Trailing silence appended after the last note ends.
    pub tail_secs: f64,
    pub attack_secs: f32,
    pub decay_secs: f32,
    /// Sustain level relative to the note velocity (0.0 – 1.0).
    pub sustain_level: f32,
    pub release_secs: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            tail_secs: 1.0,
            attack_secs: 0.005,
            decay_secs: 0.1,
            sustain_level: 0.3,
            release_secs: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseConfig
// ---------------------------------------------------------------------------

/// Connection settings for the external note-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Base URL of the service, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Project identifier sent with every request.
    pub project_id: String,
    /// Maximum seconds to wait for a response before giving up.
    pub timeout_secs: u64,
    /// Replies with a note ending later than this are rejected.
    pub max_reply_secs: f64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            project_id: "jam-space".into(),
            timeout_secs: 30,
            max_reply_secs: 300.0,
        }
    }
}

// ---------------------------------------------------------------------------
// DialogueConfig
// ---------------------------------------------------------------------------

/// Placement rules for AI replies on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// How far before the end of the user's phrase the reply is placed.
    /// Compensates for the silence captured to confirm the phrase ended.
    pub response_lead_secs: f64,
    /// Resume playback automatically when a reply lands while stopped.
    pub auto_resume: bool,
    /// On auto-resume, seek this far before the reply's start.
    pub auto_resume_lead_secs: f64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            response_lead_secs: 1.0,
            auto_resume: true,
            auto_resume_lead_secs: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Session-wide limits and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Every buffer placed on the timeline uses this rate.
    pub sample_rate: u32,
    /// Longest accepted backtrack (5 minutes).
    pub max_duration_secs: f64,
    /// Tempo used when detection fails or no backtrack is loaded.
    pub default_bpm: u32,
    /// Transport clock tick period.
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            max_duration_secs: 300.0,
            default_bpm: 120,
            tick_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use jam_session::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.segmenter.energy_threshold > 0.0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub segmenter: SegmenterConfig,
    pub extractor: ExtractorConfig,
    pub synth: SynthConfig,
    pub response: ResponseConfig,
    pub dialogue: DialogueConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The synthesizer must render at the session rate; this returns the
    /// synth settings with that rate enforced.
    pub fn synth_for_session(&self) -> SynthConfig {
        SynthConfig {
            sample_rate: self.session.sample_rate,
            ..self.synth.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
