//! Audio inputs for the lip-sync driver: microphone capture and clip
//! playback via cpal, and file decoding via symphonia.

pub mod capture;
pub mod decode;
pub mod playback;

use std::time::{Duration, Instant};

/// A chunk of mono audio samples fed to the spectrum analyzer.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono f32 samples in \[-1, 1\].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// When the samples were captured or handed to the output device.
    pub captured_at: Instant,
}

/// A fully decoded mono clip.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono f32 samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioClip {
    /// Length of the clip. Zero for an empty clip or a zero sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Lifecycle signals from whatever is playing the speech audio.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback began; the clip length is known when the source knows it.
    Started { duration: Option<Duration> },
    /// The audio ran to its end.
    Ended,
    /// The audio resource failed mid-play.
    Error(String),
}

/// Average interleaved channels down to mono.
pub fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = usize::from(channels.max(1));
    if ch == 1 {
        return data.to_vec();
    }
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}
