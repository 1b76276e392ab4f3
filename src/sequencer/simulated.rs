//! Palette cycling for speech sources that expose no waveform.

use crate::config::SimulatedConfig;
use crate::viseme::Viseme;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Walks a short viseme palette at a jittered cadence.
///
/// Each step advances the cursor by one palette slot, give or take
/// `max_jitter`, and holds the result for a uniform random interval.
pub struct SimulatedCycler {
    palette: Vec<Viseme>,
    cursor: usize,
    min_interval_ms: u64,
    max_interval_ms: u64,
    max_jitter: i64,
    rng: StdRng,
}

impl SimulatedCycler {
    pub fn new(config: &SimulatedConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic cycler for tests and reproducible demos.
    pub fn with_seed(config: &SimulatedConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &SimulatedConfig, rng: StdRng) -> Self {
        let min = config.min_interval_ms.max(1);
        // A jitter wider than the palette only aliases back onto it.
        let max_jitter = config.max_jitter.min(config.palette.len());
        Self {
            palette: config.palette.clone(),
            cursor: 0,
            min_interval_ms: min,
            max_interval_ms: config.max_interval_ms.max(min),
            max_jitter: i64::try_from(max_jitter).unwrap_or(0),
            rng,
        }
    }

    /// Next viseme and how long to hold it.
    ///
    /// An empty palette yields silence at the normal cadence.
    pub fn next_step(&mut self) -> (Viseme, Duration) {
        let hold = Duration::from_millis(
            self.rng
                .gen_range(self.min_interval_ms..=self.max_interval_ms),
        );
        let len = self.palette.len();
        if len == 0 {
            return (Viseme::Sil, hold);
        }

        let jitter = if self.max_jitter > 0 {
            self.rng.gen_range(-self.max_jitter..=self.max_jitter)
        } else {
            0
        };
        let len_i = i64::try_from(len).unwrap_or(i64::MAX);
        let cursor = i64::try_from(self.cursor).unwrap_or(0);
        let next = (cursor + 1 + jitter).rem_euclid(len_i);
        self.cursor = usize::try_from(next).unwrap_or(0);
        (self.palette[self.cursor], hold)
    }
}
