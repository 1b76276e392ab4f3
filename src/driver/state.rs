//! Published speech state: what the face should be doing right now.
//!
//! Every write is tagged with the session that made it and ignored once that
//! session is gone, so a late timer tick can never resurrect a torn-down
//! session. Lifecycle events are broadcast under the same lock, which keeps
//! them in the order the state changed.

use crate::emotion::Emotion;
use crate::runtime::{LipSyncEvent, ModeKind, SessionId, SessionOutcome};
use crate::viseme::Viseme;
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Read-only view of the speech state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeechSnapshot {
    pub emotion: Emotion,
    pub is_talking: bool,
    pub viseme: Viseme,
    /// Smoothed loudness, 0..1. Only audio-analysis sessions set it.
    pub volume: f32,
    pub session: Option<SessionId>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: SpeechSnapshot,
    /// Bumped whenever a pending emotion reset must be abandoned.
    emotion_epoch: u64,
}

/// Shared between the driver, its session tasks and emotion-reset timers.
#[derive(Debug)]
pub(crate) struct SpeechState {
    inner: Mutex<Inner>,
    events: broadcast::Sender<LipSyncEvent>,
}

impl SpeechState {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<LipSyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn snapshot(&self) -> SpeechSnapshot {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).snapshot
    }

    fn emit(&self, event: LipSyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Make `id` the active session: talking, mouth closed.
    pub(crate) fn begin(&self, id: SessionId, mode: ModeKind) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.snapshot.session = Some(id);
        inner.snapshot.is_talking = mode != ModeKind::Empty;
        inner.snapshot.viseme = Viseme::Sil;
        inner.snapshot.volume = 0.0;
        inner.emotion_epoch += 1;
        self.emit(LipSyncEvent::SessionStarted { id, mode });
    }

    /// Publish a viseme for `id`.
    ///
    /// Returns `false` if `id` is no longer the active session. With
    /// `every` set, an event is emitted even if the viseme did not change.
    pub(crate) fn publish_viseme(&self, id: SessionId, viseme: Viseme, every: bool) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.snapshot.session != Some(id) {
            return false;
        }
        let changed = inner.snapshot.viseme != viseme;
        inner.snapshot.viseme = viseme;
        if changed || every {
            self.emit(LipSyncEvent::Viseme { id, viseme });
        }
        true
    }

    /// Publish the smoothed level for `id`. Same staleness rule as visemes.
    pub(crate) fn publish_level(&self, id: SessionId, level: f32) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.snapshot.session != Some(id) {
            return false;
        }
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        inner.snapshot.volume = level;
        self.emit(LipSyncEvent::AudioLevel { id, rms: level });
        true
    }

    /// Return to idle if `id` is still the active session.
    ///
    /// Yields the emotion epoch a reset timer must match to take effect.
    pub(crate) fn finish(&self, id: SessionId, outcome: SessionOutcome) -> Option<u64> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.snapshot.session != Some(id) {
            return None;
        }
        inner.snapshot.session = None;
        inner.snapshot.is_talking = false;
        inner.snapshot.viseme = Viseme::Sil;
        inner.snapshot.volume = 0.0;
        inner.emotion_epoch += 1;
        self.emit(LipSyncEvent::SessionEnded { id, outcome });
        Some(inner.emotion_epoch)
    }

    pub(crate) fn set_emotion(&self, emotion: Emotion) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.snapshot.emotion = emotion;
        inner.emotion_epoch += 1;
    }

    /// Reset to neutral unless something changed since `epoch` was issued.
    pub(crate) fn reset_emotion(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.emotion_epoch != epoch {
            return false;
        }
        inner.snapshot.emotion = Emotion::Neutral;
        true
    }
}
