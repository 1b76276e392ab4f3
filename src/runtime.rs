//! Lifecycle events emitted by the playback driver for UI and observability.
//!
//! This is intentionally lightweight (no heavy payloads) so the driver can
//! emit events from its timer tasks without blocking.

use crate::viseme::Viseme;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one speech-playback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which sequencing strategy a session ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    /// One viseme per transcript character, evenly spread over the clip.
    Text,
    /// Live spectrum analysis of the audio signal.
    Analysis,
    /// Palette cycling while a speaking flag is set.
    Simulated,
    /// Nothing usable was supplied; the session completed immediately.
    Empty,
}

/// How a session ended.
///
/// Every session resolves to exactly one outcome; there is no error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum SessionOutcome {
    /// The sequence or the audio ran to its natural end.
    Completed,
    /// Stopped explicitly, or replaced by a newer session.
    Stopped,
    /// The audio resource reported an error mid-play.
    Failed(String),
}

/// Events that describe what the lip-sync driver is doing "right now".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum LipSyncEvent {
    /// A session began speaking.
    SessionStarted { id: SessionId, mode: ModeKind },
    /// The active viseme changed.
    Viseme { id: SessionId, viseme: Viseme },
    /// Smoothed RMS level of the analysed audio (analysis mode only).
    ///
    /// Intended for renderers with a single jaw channel.
    AudioLevel { id: SessionId, rms: f32 },
    /// A session was torn down.
    SessionEnded {
        id: SessionId,
        outcome: SessionOutcome,
    },
}
