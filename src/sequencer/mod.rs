//! Viseme sequencing: turning a speech source into a timed viseme stream.
//!
//! Three strategies, picked by what the speech source can offer:
//!
//! - **Text**: a transcript plus the clip length ([`text::TextSchedule`]).
//! - **Analysis**: a live audio feed ([`analysis::SpectrumAnalyzer`]).
//! - **Simulated**: only a "currently speaking" flag
//!   ([`simulated::SimulatedCycler`]).
//!
//! When several are available the most precise wins, in that order.

pub mod analysis;
pub mod simulated;
pub mod text;

use crate::audio::{AudioFrame, PlaybackEvent};
use crate::runtime::ModeKind;
use std::sync::Arc;
use std::time::Duration;
use text::TextSchedule;
use tokio::sync::{mpsc, watch};

/// Shared "is the speech source talking right now" flag.
///
/// Clones observe the same value. Clearing it ends a simulated session
/// immediately rather than at the next cadence step.
#[derive(Debug, Clone)]
pub struct SpeakingFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl SpeakingFlag {
    pub fn new(speaking: bool) -> Self {
        let (tx, _rx) = watch::channel(speaking);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, speaking: bool) {
        self.tx.send_replace(speaking);
    }

    pub fn is_speaking(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for SpeakingFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Everything a speech source can hand the driver for one utterance.
///
/// Fill in whatever is available; the driver picks the best mode.
#[derive(Debug, Default)]
pub struct SpeechInput {
    /// Transcript of the utterance.
    pub text: Option<String>,
    /// Length of the spoken audio, in seconds.
    pub duration_secs: Option<f64>,
    /// Live mono frames of the audio being played. Closing the channel marks
    /// the end of the audio.
    pub audio: Option<mpsc::Receiver<AudioFrame>>,
    /// Coarse speaking flag for sources that expose no waveform.
    pub speaking: Option<SpeakingFlag>,
    /// Lifecycle of the audio playback, if the caller has one.
    pub playback: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
}

impl SpeechInput {
    /// Transcript plus known clip length.
    pub fn text(text: impl Into<String>, duration_secs: f64) -> Self {
        Self::default().with_text(text, duration_secs)
    }

    /// Live audio feed.
    pub fn audio(frames: mpsc::Receiver<AudioFrame>) -> Self {
        Self::default().with_audio(frames)
    }

    /// Speaking flag only.
    pub fn simulated(flag: SpeakingFlag) -> Self {
        Self::default().with_speaking(flag)
    }

    pub fn with_text(mut self, text: impl Into<String>, duration_secs: f64) -> Self {
        self.text = Some(text.into());
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_audio(mut self, frames: mpsc::Receiver<AudioFrame>) -> Self {
        self.audio = Some(frames);
        self
    }

    pub fn with_speaking(mut self, flag: SpeakingFlag) -> Self {
        self.speaking = Some(flag);
        self
    }

    pub fn with_playback(mut self, events: mpsc::UnboundedReceiver<PlaybackEvent>) -> Self {
        self.playback = Some(events);
        self
    }
}

/// The strategy chosen for one session, with the inputs it consumes.
#[derive(Debug)]
pub enum SequencerMode {
    Text(TextSchedule),
    Analysis(mpsc::Receiver<AudioFrame>),
    Simulated(SpeakingFlag),
    /// No usable signal; the session completes as soon as it starts.
    Empty,
}

impl SequencerMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            SequencerMode::Text(_) => ModeKind::Text,
            SequencerMode::Analysis(_) => ModeKind::Analysis,
            SequencerMode::Simulated(_) => ModeKind::Simulated,
            SequencerMode::Empty => ModeKind::Empty,
        }
    }
}

/// Pick the most precise mode the input supports.
///
/// Text needs non-empty text and a finite positive duration; anything less
/// falls through to the audio feed, then to the speaking flag. Inputs the
/// chosen mode does not use are dropped. The playback lifecycle channel is
/// handed back untouched since it applies to every mode.
pub fn select_mode(
    input: SpeechInput,
    min_interval: Duration,
) -> (SequencerMode, Option<mpsc::UnboundedReceiver<PlaybackEvent>>) {
    let SpeechInput {
        text,
        duration_secs,
        audio,
        speaking,
        playback,
    } = input;

    let schedule = match (text.as_deref(), duration_secs) {
        (Some(text), Some(secs)) => TextSchedule::new(text, secs, min_interval),
        _ => None,
    };

    let mode = if let Some(schedule) = schedule {
        SequencerMode::Text(schedule)
    } else if let Some(frames) = audio {
        SequencerMode::Analysis(frames)
    } else if let Some(flag) = speaking {
        SequencerMode::Simulated(flag)
    } else {
        SequencerMode::Empty
    };
    (mode, playback)
}
