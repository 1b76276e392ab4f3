//! Playback driver: runs one lip-sync session at a time in real time.
//!
//! ```text
//! Idle ──start──▶ Speaking ──┬─ sequence/audio ran out ─▶ Idle (Completed)
//!                            ├─ stop() or new start() ──▶ Idle (Stopped)
//!                            └─ playback error ─────────▶ Idle (Failed)
//! ```
//!
//! All three exits run the same teardown: cancel the session task, close
//! the mouth, clear the talking flag, settle the session's completion
//! exactly once, and announce the end. A session never fails to settle;
//! errors are reported as an outcome, not an `Err`.

pub mod state;

use crate::audio::{AudioFrame, PlaybackEvent};
use crate::config::LipSyncConfig;
use crate::emotion::Emotion;
use crate::runtime::{LipSyncEvent, ModeKind, SessionId, SessionOutcome};
use crate::sequencer::analysis::{EnergyMeter, SpectrumAnalyzer};
use crate::sequencer::simulated::SimulatedCycler;
use crate::sequencer::text::TextSchedule;
use crate::sequencer::{SequencerMode, SpeakingFlag, SpeechInput, select_mode};
use state::SpeechState;
pub use state::SpeechSnapshot;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to a started session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    mode: ModeKind,
    done: oneshot::Receiver<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The sequencing strategy this session is using.
    pub fn mode(&self) -> ModeKind {
        self.mode
    }

    /// Wait for the session to end, however it ends.
    pub async fn finished(self) -> SessionOutcome {
        // The sender is only dropped unsent if the driver itself went away.
        self.done.await.unwrap_or(SessionOutcome::Stopped)
    }
}

/// Drives lip-sync sessions and publishes the speech state they produce.
///
/// Cheap to clone; clones share the same session and state. Starting a
/// session spawns onto the current Tokio runtime.
#[derive(Clone)]
pub struct PlaybackDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    config: LipSyncConfig,
    state: Arc<SpeechState>,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    done: oneshot::Sender<SessionOutcome>,
}

/// A resolved mode with everything its loop needs.
enum Plan {
    Text(TextSchedule),
    Analysis {
        frames: mpsc::Receiver<AudioFrame>,
        analyzer: SpectrumAnalyzer,
    },
    Simulated(SpeakingFlag),
    Empty,
}

impl Plan {
    fn kind(&self) -> ModeKind {
        match self {
            Plan::Text(_) => ModeKind::Text,
            Plan::Analysis { .. } => ModeKind::Analysis,
            Plan::Simulated(_) => ModeKind::Simulated,
            Plan::Empty => ModeKind::Empty,
        }
    }
}

impl PlaybackDriver {
    pub fn new(config: LipSyncConfig) -> Self {
        let state = Arc::new(SpeechState::new(config.driver.event_capacity));
        Self {
            inner: Arc::new(DriverInner {
                config,
                state,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &LipSyncConfig {
        &self.inner.config
    }

    /// Start lip-syncing an utterance, replacing any active session.
    ///
    /// The previous session, if any, is fully torn down (outcome
    /// [`SessionOutcome::Stopped`]) before the new one publishes anything.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, input: SpeechInput) -> SessionHandle {
        let inner = &self.inner;
        let (mode, playback) = select_mode(input, inner.config.sequencer.min_interval());
        let id = SessionId::new();
        let cancel = CancellationToken::new();
        let plan = inner.prepare(mode, &cancel);
        let kind = plan.kind();
        let (done_tx, done_rx) = oneshot::channel();

        {
            let mut active = inner.active.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = active.take() {
                debug!(session = %previous.id, "replacing active session");
                inner.end_session(previous, SessionOutcome::Stopped);
            }
            inner.state.begin(id, kind);
            *active = Some(ActiveSession {
                id,
                cancel: cancel.clone(),
                done: done_tx,
            });
        }
        info!(session = %id, mode = ?kind, "lip-sync session started");

        if kind == ModeKind::Empty {
            inner.finish_session(id, SessionOutcome::Completed);
        } else {
            tokio::spawn(run_session(Arc::clone(inner), id, cancel, plan, playback));
        }

        SessionHandle {
            id,
            mode: kind,
            done: done_rx,
        }
    }

    /// Stop the active session, if any. Safe to call any number of times.
    pub fn stop(&self) {
        let mut active = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = active.take() {
            self.inner.end_session(session, SessionOutcome::Stopped);
        }
    }

    /// Feed a lifecycle event from an external audio player.
    ///
    /// Ignored unless `id` is the active session.
    pub fn handle_playback_event(&self, id: SessionId, event: PlaybackEvent) {
        if let Some(outcome) = playback_outcome(event) {
            self.inner.finish_session(id, outcome);
        }
    }

    /// Change the resting expression. Cancels any pending reset to neutral.
    pub fn set_emotion(&self, emotion: Emotion) {
        debug!(%emotion, "emotion set");
        self.inner.state.set_emotion(emotion);
    }

    pub fn snapshot(&self) -> SpeechSnapshot {
        self.inner.state.snapshot()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.id)
    }

    /// Lifecycle events for every session started after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<LipSyncEvent> {
        self.inner.state.subscribe()
    }
}

impl DriverInner {
    fn prepare(&self, mode: SequencerMode, cancel: &CancellationToken) -> Plan {
        match mode {
            SequencerMode::Text(schedule) => Plan::Text(schedule),
            SequencerMode::Analysis(frames) => match SpectrumAnalyzer::new(&self.config.analysis) {
                Ok(analyzer) => Plan::Analysis { frames, analyzer },
                Err(e) => {
                    warn!("audio analysis unavailable, using simulated lip-sync: {e}");
                    let flag = SpeakingFlag::new(true);
                    tokio::spawn(drain_feed(frames, flag.clone(), cancel.clone()));
                    Plan::Simulated(flag)
                }
            },
            SequencerMode::Simulated(flag) => Plan::Simulated(flag),
            SequencerMode::Empty => Plan::Empty,
        }
    }

    /// End `id` if it is still the active session.
    fn finish_session(&self, id: SessionId, outcome: SessionOutcome) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|s| s.id == id)
            && let Some(session) = active.take()
        {
            self.end_session(session, outcome);
        }
    }

    /// The one teardown path. Callers hold the `active` lock and have already
    /// taken `session` out of it.
    fn end_session(&self, session: ActiveSession, outcome: SessionOutcome) {
        session.cancel.cancel();
        match &outcome {
            SessionOutcome::Failed(reason) => {
                warn!(session = %session.id, "lip-sync session failed: {reason}");
            }
            other => info!(session = %session.id, outcome = ?other, "lip-sync session ended"),
        }
        if let Some(epoch) = self.state.finish(session.id, outcome.clone()) {
            self.schedule_emotion_reset(epoch);
        }
        // The handle may have been dropped.
        let _ = session.done.send(outcome);
    }

    fn schedule_emotion_reset(&self, epoch: u64) {
        let delay = self.config.driver.emotion_reset_ms;
        if delay == 0 {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime for emotion reset, keeping emotion");
            return;
        };
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if state.reset_emotion(epoch) {
                debug!("emotion reset to neutral");
            }
        });
    }

    async fn drive(&self, id: SessionId, plan: Plan) -> SessionOutcome {
        match plan {
            Plan::Text(schedule) => self.drive_text(id, schedule).await,
            Plan::Analysis { frames, analyzer } => self.drive_analysis(id, frames, analyzer).await,
            Plan::Simulated(flag) => self.drive_simulated(id, flag).await,
            Plan::Empty => SessionOutcome::Completed,
        }
    }

    async fn drive_text(&self, id: SessionId, schedule: TextSchedule) -> SessionOutcome {
        debug!(
            session = %id,
            visemes = schedule.len(),
            interval = ?schedule.interval(),
            "text schedule"
        );
        let start = tokio::time::Instant::now();
        for event in schedule.events() {
            sleep_until_offset(start, event.at).await;
            if !self.state.publish_viseme(id, event.viseme, true) {
                return SessionOutcome::Stopped;
            }
            debug!(session = %id, index = event.index, viseme = %event.viseme, "viseme");
        }
        sleep_until_offset(start, schedule.total()).await;
        SessionOutcome::Completed
    }

    async fn drive_analysis(
        &self,
        id: SessionId,
        mut frames: mpsc::Receiver<AudioFrame>,
        mut analyzer: SpectrumAnalyzer,
    ) -> SessionOutcome {
        let mut meter = EnergyMeter::new();
        let frame_interval = self.config.analysis.frame_interval();
        let mut last_analysis: Option<std::time::Instant> = None;

        while let Some(frame) = frames.recv().await {
            analyzer.push_samples(&frame.samples);
            let level = meter.push(&frame.samples);

            let too_soon = last_analysis
                .is_some_and(|t| frame.captured_at.saturating_duration_since(t) < frame_interval);
            if too_soon {
                continue;
            }
            last_analysis = Some(frame.captured_at);

            let spectrum = analyzer.analyze(frame.sample_rate);
            if !self.state.publish_viseme(id, spectrum.viseme, false)
                || !self.state.publish_level(id, level)
            {
                return SessionOutcome::Stopped;
            }
        }
        debug!(session = %id, "audio feed closed");
        SessionOutcome::Completed
    }

    async fn drive_simulated(&self, id: SessionId, flag: SpeakingFlag) -> SessionOutcome {
        let mut speaking = flag.subscribe();
        let mut cycler = SimulatedCycler::new(&self.config.simulated);
        loop {
            let talking = *speaking.borrow_and_update();
            if !talking {
                break;
            }
            let (viseme, hold) = cycler.next_step();
            if !self.state.publish_viseme(id, viseme, false) {
                return SessionOutcome::Stopped;
            }
            tokio::select! {
                () = tokio::time::sleep(hold) => {}
                changed = speaking.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(session = %id, "speaking flag cleared");
        SessionOutcome::Completed
    }
}

async fn run_session(
    inner: Arc<DriverInner>,
    id: SessionId,
    cancel: CancellationToken,
    plan: Plan,
    playback: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
) {
    let outcome = tokio::select! {
        // Whoever cancelled owns the teardown.
        () = cancel.cancelled() => return,
        outcome = inner.drive(id, plan) => outcome,
        outcome = watch_playback(playback) => outcome,
    };
    inner.finish_session(id, outcome);
}

/// Resolves on the first terminal playback event; pends forever otherwise.
async fn watch_playback(events: Option<mpsc::UnboundedReceiver<PlaybackEvent>>) -> SessionOutcome {
    if let Some(mut events) = events {
        while let Some(event) = events.recv().await {
            if let Some(outcome) = playback_outcome(event) {
                return outcome;
            }
        }
    }
    std::future::pending().await
}

fn playback_outcome(event: PlaybackEvent) -> Option<SessionOutcome> {
    match event {
        PlaybackEvent::Started { duration } => {
            debug!(?duration, "playback started");
            None
        }
        PlaybackEvent::Ended => Some(SessionOutcome::Completed),
        PlaybackEvent::Error(reason) => Some(SessionOutcome::Failed(reason)),
    }
}

/// Sleeps until `offset` past `start`. A deadline beyond what the clock can
/// represent never arrives; the session then ends by stop or playback event.
async fn sleep_until_offset(start: tokio::time::Instant, offset: Duration) {
    match start.checked_add(offset) {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Keeps a fallback session alive exactly as long as the audio feed is open.
async fn drain_feed(
    mut frames: mpsc::Receiver<AudioFrame>,
    flag: SpeakingFlag,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            frame = frames.recv() => {
                if frame.is_none() {
                    flag.set(false);
                    return;
                }
            }
        }
    }
}
