//! Lipsync: real-time lip-sync driver for talking 3D avatars.
//!
//! Turns speech (a transcript with its clip length, a live audio signal, or
//! just a "speaking" flag) into a continuous stream of mouth shapes and
//! facial-expression weights for a morph-target rig:
//! text/audio → classify → sequence → blend → rig
//!
//! # Architecture
//!
//! - **Classifier** ([`viseme`]): characters and spectra to viseme categories
//! - **Sequencer** ([`sequencer`]): text-driven, audio-analysis and simulated
//!   viseme timing
//! - **Blend engine** ([`blend`]): exponential smoothing of emotion, viseme
//!   and blink channels
//! - **Playback driver** ([`driver`]): one real-time session at a time, with
//!   a single teardown for completion, stop and playback errors
//! - **Rig binder** ([`rig`]): writes weights into meshes by morph name
//! - **Animator** ([`animator`]): the per-frame snapshot renderers consume
//! - **Audio** ([`audio`]): microphone capture and clip playback via `cpal`,
//!   clip decoding via `symphonia`

pub mod animator;
pub mod audio;
pub mod blend;
pub mod config;
pub mod driver;
pub mod emotion;
pub mod error;
pub mod lipsync_dirs;
pub mod rig;
pub mod runtime;
pub mod sequencer;
pub mod viseme;

pub use animator::{AvatarAnimator, AvatarSnapshot};
pub use config::LipSyncConfig;
pub use driver::{PlaybackDriver, SessionHandle, SpeechSnapshot};
pub use emotion::{Emotion, extract_emotion};
pub use error::{LipSyncError, Result};
pub use runtime::{LipSyncEvent, ModeKind, SessionId, SessionOutcome};
pub use sequencer::{SpeakingFlag, SpeechInput};
pub use viseme::Viseme;
