//! Audio-driven viseme estimation.
//!
//! [`SpectrumAnalyzer`] mirrors a browser `AnalyserNode`: a Blackman-windowed
//! FFT over the most recent `fft_size` samples, magnitudes smoothed across
//! frames, then mapped onto a decibel range normalized to 0..1. The average
//! normalized bin is the volume; the loudest bin gives the dominant
//! frequency. Both feed [`classify_frequency_with_floor`].
//!
//! This needs no transcript, so it works for any live signal (the
//! assistant's playback or a microphone), at the price of coarser shapes
//! than text-driven sequencing.

use crate::audio::AudioClip;
use crate::config::AnalysisConfig;
use crate::error::{LipSyncError, Result};
use crate::viseme::{Viseme, classify_frequency_with_floor};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Serialize;
use std::sync::Arc;

/// One analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumFrame {
    /// Mean normalized bin level, 0..1.
    pub volume: f32,
    /// Centre frequency of the loudest bin, in Hz.
    pub dominant_hz: f32,
    pub viseme: Viseme,
}

/// Rolling FFT analyzer over the most recent samples.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    history: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    noise_floor: f32,
}

impl SpectrumAnalyzer {
    /// Plan the FFT for the configured window size.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Analysis`] if the FFT size is not a power of
    /// two of at least 32, or the decibel range is empty.
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let n = config.fft_size;
        if n < 32 || !n.is_power_of_two() {
            return Err(LipSyncError::Analysis(format!(
                "fft_size must be a power of two >= 32, got {n}"
            )));
        }
        let db_range_ok = config.min_decibels.is_finite()
            && config.max_decibels.is_finite()
            && config.min_decibels < config.max_decibels;
        if !db_range_ok {
            return Err(LipSyncError::Analysis("empty decibel range".into()));
        }
        if !(0.0..=1.0).contains(&config.noise_floor) {
            return Err(LipSyncError::Analysis(format!(
                "noise floor must be in [0, 1], got {}",
                config.noise_floor
            )));
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        Ok(Self {
            fft,
            fft_size: n,
            window: blackman(n),
            history: vec![0.0; n],
            smoothed: vec![0.0; n / 2],
            scratch: vec![Complex::new(0.0, 0.0); n],
            smoothing: config.smoothing_time_constant.clamp(0.0, 0.999),
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            noise_floor: config.noise_floor,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Append samples, keeping only the most recent `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let n = self.fft_size;
        if samples.len() >= n {
            self.history.copy_from_slice(&samples[samples.len() - n..]);
            return;
        }
        let keep = n - samples.len();
        self.history.copy_within(samples.len().., 0);
        self.history[keep..].copy_from_slice(samples);
    }

    /// Analyse the current window.
    ///
    /// `sample_rate` converts the loudest bin to hertz; it may change between
    /// calls if the source does.
    pub fn analyze(&mut self, sample_rate: u32) -> SpectrumFrame {
        let n = self.fft_size;
        for (slot, (&s, &w)) in self
            .scratch
            .iter_mut()
            .zip(self.history.iter().zip(self.window.iter()))
        {
            let v = if s.is_finite() { s * w } else { 0.0 };
            *slot = Complex::new(v, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing;
        let range = self.max_db - self.min_db;
        let mut level_sum = 0.0f32;
        let mut loudest = (0usize, f32::MIN);

        for (k, (smoothed, bin)) in self.smoothed.iter_mut().zip(&self.scratch).enumerate() {
            let magnitude = bin.norm() / n as f32;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };

            let level = if *smoothed > 0.0 {
                ((20.0 * smoothed.log10() - self.min_db) / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
            level_sum += level;

            // DC carries offset, not voice.
            if k > 0 && *smoothed > loudest.1 {
                loudest = (k, *smoothed);
            }
        }

        let volume = level_sum / self.smoothed.len() as f32;
        let dominant_hz = loudest.0 as f32 * sample_rate as f32 / n as f32;
        SpectrumFrame {
            volume,
            dominant_hz,
            viseme: classify_frequency_with_floor(dominant_hz, volume, self.noise_floor),
        }
    }

    /// Forget all history and smoothing state.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
    }
}

fn blackman(n: usize) -> Vec<f32> {
    let denom = n as f32;
    (0..n)
        .map(|i| {
            let x = std::f32::consts::TAU * i as f32 / denom;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Smoothed loudness for renderers that only have a jaw channel.
#[derive(Debug, Clone, Default)]
pub struct EnergyMeter {
    level: f32,
}

impl EnergyMeter {
    /// Gain applied to RMS before clamping; speech RMS rarely exceeds ~0.15.
    const GAIN: f32 = 6.0;
    /// Weight of the previous level in the one-pole smoother.
    const RETAIN: f32 = 0.85;

    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a frame into the meter and return the new level in 0..1.
    pub fn push(&mut self, samples: &[f32]) -> f32 {
        let target = (compute_rms(samples) * Self::GAIN).clamp(0.0, 1.0);
        self.level = self.level * Self::RETAIN + target * (1.0 - Self::RETAIN);
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

/// Compute RMS energy of audio samples.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    if rms.is_finite() { rms } else { 0.0 }
}

/// A run of identical visemes in an offline timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisemeSpan {
    pub viseme: Viseme,
    pub start_ms: f32,
    pub duration_ms: f32,
}

/// Run the live analyzer over a decoded clip, one frame per
/// `frame_interval_ms`, merging consecutive identical visemes.
///
/// # Errors
///
/// Returns an error if the analyzer cannot be built from `config`.
pub fn analyze_clip(clip: &AudioClip, config: &AnalysisConfig) -> Result<Vec<VisemeSpan>> {
    let mut analyzer = SpectrumAnalyzer::new(config)?;
    if clip.samples.is_empty() || clip.sample_rate == 0 {
        return Ok(Vec::new());
    }

    let hop = usize::try_from(u64::from(clip.sample_rate) * config.frame_interval_ms.max(1) / 1000)
        .unwrap_or(usize::MAX)
        .max(1);
    let ms_per_sample = 1000.0 / clip.sample_rate as f32;

    let mut spans: Vec<VisemeSpan> = Vec::new();
    for (i, chunk) in clip.samples.chunks(hop).enumerate() {
        analyzer.push_samples(chunk);
        let frame = analyzer.analyze(clip.sample_rate);
        let start_ms = (i * hop) as f32 * ms_per_sample;
        let duration_ms = chunk.len() as f32 * ms_per_sample;

        match spans.last_mut() {
            Some(last) if last.viseme == frame.viseme => last.duration_ms += duration_ms,
            _ => spans.push(VisemeSpan {
                viseme: frame.viseme,
                start_ms,
                duration_ms,
            }),
        }
    }
    Ok(spans)
}
