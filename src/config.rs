//! Configuration types for the lip-sync driver.

use crate::error::{LipSyncError, Result};
use crate::viseme::Viseme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the lip-sync driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Text-driven sequencing settings.
    pub sequencer: SequencerConfig,
    /// Spectrum analysis settings for audio-driven sequencing.
    pub analysis: AnalysisConfig,
    /// Fallback cadence when no signal is available.
    pub simulated: SimulatedConfig,
    /// Blend engine rates.
    pub smoothing: SmoothingConfig,
    /// Automatic blinking.
    pub blink: BlinkConfig,
    /// Playback driver behaviour.
    pub driver: DriverConfig,
    /// Audio device selection.
    pub audio: AudioConfig,
}

/// Text-driven sequencing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Lower bound on the spacing between consecutive visemes, in ms.
    ///
    /// Long texts over short clips would otherwise flicker faster than a
    /// renderer can show.
    pub min_interval_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 50,
        }
    }
}

impl SequencerConfig {
    /// Minimum interval as a [`Duration`].
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Spectrum analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// FFT window size in samples (must be a power of two, >= 32).
    pub fft_size: usize,
    /// Exponential smoothing applied to bin magnitudes between frames.
    ///
    /// 0.0 means no smoothing; values approaching 1.0 average over many frames.
    pub smoothing_time_constant: f32,
    /// Magnitude (dB) mapped to 0 when normalizing bins.
    pub min_decibels: f32,
    /// Magnitude (dB) mapped to 1 when normalizing bins.
    pub max_decibels: f32,
    /// Average normalized volume below which the mouth stays closed.
    pub noise_floor: f32,
    /// How often the analyzer samples the spectrum, in ms.
    pub frame_interval_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            noise_floor: crate::viseme::NOISE_FLOOR,
            frame_interval_ms: 16,
        }
    }
}

impl AnalysisConfig {
    /// Analysis cadence as a [`Duration`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Simulated (no-signal) lip-sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Visemes cycled through while speaking.
    pub palette: Vec<Viseme>,
    /// Shortest hold time for one palette entry, in ms.
    pub min_interval_ms: u64,
    /// Longest hold time for one palette entry, in ms.
    pub max_interval_ms: u64,
    /// Maximum deviation, in palette steps, from advancing by exactly one.
    pub max_jitter: usize,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            palette: vec![
                Viseme::Sil,
                Viseme::AA,
                Viseme::E,
                Viseme::O,
                Viseme::U,
                Viseme::I,
            ],
            min_interval_ms: 80,
            max_interval_ms: 120,
            max_jitter: 1,
        }
    }
}

/// Blend engine rates, all per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Rate at which untargeted channels relax to zero.
    pub decay_rate: f32,
    /// Rate at which emotion channels approach their targets.
    pub emotion_rate: f32,
    /// Rate at which the active viseme channel approaches full weight.
    pub viseme_rate: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            decay_rate: 8.0,
            emotion_rate: 3.0,
            viseme_rate: 15.0,
        }
    }
}

/// Automatic blink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Whether the avatar blinks on its own.
    pub enabled: bool,
    /// Shortest gap between blinks, in seconds.
    pub min_interval_secs: f32,
    /// Longest gap between blinks, in seconds.
    pub max_interval_secs: f32,
    /// Blink progress per second; a blink lasts `1 / speed` seconds.
    pub speed: f32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 2.0,
            max_interval_secs: 6.0,
            speed: 8.0,
        }
    }
}

/// Playback driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Delay before the emotion returns to neutral after speech ends, in ms.
    /// `0` keeps the emotion until it is changed explicitly.
    pub emotion_reset_ms: u64,
    /// Capacity of the lifecycle event broadcast channel.
    pub event_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            emotion_reset_ms: 1000,
            event_capacity: 256,
        }
    }
}

/// Audio device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
    /// Frames per tap chunk forwarded from playback to the analyzer.
    pub tap_chunk_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            tap_chunk_frames: 512,
        }
    }
}

impl LipSyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| LipSyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LipSyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/lipsync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::lipsync_dirs::config_file()
    }

    /// Check values that serde cannot constrain on its own.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.fft_size < 32 || !a.fft_size.is_power_of_two() {
            return Err(LipSyncError::Config(format!(
                "analysis.fft_size must be a power of two >= 32, got {}",
                a.fft_size
            )));
        }
        if !(0.0..1.0).contains(&a.smoothing_time_constant) {
            return Err(LipSyncError::Config(format!(
                "analysis.smoothing_time_constant must be in [0, 1), got {}",
                a.smoothing_time_constant
            )));
        }
        if a.min_decibels >= a.max_decibels {
            return Err(LipSyncError::Config(
                "analysis.min_decibels must be below analysis.max_decibels".into(),
            ));
        }
        if !(0.0..=1.0).contains(&a.noise_floor) {
            return Err(LipSyncError::Config(format!(
                "analysis.noise_floor must be in [0, 1], got {}",
                a.noise_floor
            )));
        }

        let s = &self.simulated;
        if s.min_interval_ms == 0 || s.min_interval_ms > s.max_interval_ms {
            return Err(LipSyncError::Config(format!(
                "simulated interval range {}..{} ms is invalid",
                s.min_interval_ms, s.max_interval_ms
            )));
        }

        let r = &self.smoothing;
        for (name, rate) in [
            ("decay_rate", r.decay_rate),
            ("emotion_rate", r.emotion_rate),
            ("viseme_rate", r.viseme_rate),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(LipSyncError::Config(format!(
                    "smoothing.{name} must be a non-negative number, got {rate}"
                )));
            }
        }
        if r.viseme_rate <= r.decay_rate || r.viseme_rate <= r.emotion_rate {
            return Err(LipSyncError::Config(format!(
                "smoothing.viseme_rate ({}) must exceed decay_rate ({}) and emotion_rate ({})",
                r.viseme_rate, r.decay_rate, r.emotion_rate
            )));
        }

        let b = &self.blink;
        if !b.min_interval_secs.is_finite()
            || !b.max_interval_secs.is_finite()
            || b.min_interval_secs < 0.0
            || b.min_interval_secs > b.max_interval_secs
        {
            return Err(LipSyncError::Config(format!(
                "blink interval range {}..{} s is invalid",
                b.min_interval_secs, b.max_interval_secs
            )));
        }
        if !b.speed.is_finite() || b.speed <= 0.0 {
            return Err(LipSyncError::Config(format!(
                "blink.speed must be positive, got {}",
                b.speed
            )));
        }
        Ok(())
    }
}
