//! Automatic blinking, independent of speech.

use crate::config::BlinkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Morph channels driven by a blink.
pub const BLINK_CHANNELS: [&str; 2] = ["eyeBlinkLeft", "eyeBlinkRight"];

/// Blink clock and curve.
///
/// Idle until its own clock passes `next_blink_at`, then runs a half-sine
/// close-and-open curve and schedules the next blink a uniform random
/// interval later.
#[derive(Debug, Clone)]
pub struct BlinkState {
    enabled: bool,
    min_interval: f32,
    max_interval: f32,
    speed: f32,
    rng: StdRng,
    clock: f32,
    next_blink_at: f32,
    blinking: bool,
    progress: f32,
}

impl BlinkState {
    pub fn new(config: &BlinkConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: &BlinkConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &BlinkConfig, rng: StdRng) -> Self {
        let defaults = BlinkConfig::default();
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let min_interval = finite_or(config.min_interval_secs, defaults.min_interval_secs).max(0.0);
        let max_interval =
            finite_or(config.max_interval_secs, defaults.max_interval_secs).max(min_interval);
        let mut state = Self {
            enabled: config.enabled,
            min_interval,
            max_interval,
            speed: if config.speed.is_finite() && config.speed > 0.0 {
                config.speed
            } else {
                8.0
            },
            rng,
            clock: 0.0,
            next_blink_at: 0.0,
            blinking: false,
            progress: 0.0,
        };
        state.next_blink_at = state.random_gap();
        state
    }

    fn random_gap(&mut self) -> f32 {
        self.rng.gen_range(self.min_interval..=self.max_interval)
    }

    /// Advance by `delta` seconds and return the eyelid weight while a blink
    /// is in flight, or `None` when the eyes are free to relax.
    pub fn advance(&mut self, delta: f32) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        self.clock += delta;

        if !self.blinking && self.clock > self.next_blink_at {
            self.blinking = true;
            self.progress = 0.0;
        }
        if !self.blinking {
            return None;
        }

        self.progress += delta * self.speed;
        if self.progress >= 1.0 {
            self.blinking = false;
            self.progress = 0.0;
            self.next_blink_at = self.clock + self.random_gap();
            return None;
        }
        Some((self.progress * std::f32::consts::PI).sin())
    }

    pub fn is_blinking(&self) -> bool {
        self.blinking
    }

    /// Curve position of the current blink, 0..1.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Seconds on the blink clock at which the next blink starts.
    pub fn next_blink_at(&self) -> f32 {
        self.next_blink_at
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }
}
