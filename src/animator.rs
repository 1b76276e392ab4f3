//! Per-frame renderer surface.
//!
//! One [`AvatarAnimator`] per rig. Each render frame, feed it the elapsed
//! time and the driver's [`SpeechSnapshot`]; it returns everything the
//! renderer needs for that frame.

use crate::blend::blink::BlinkState;
use crate::blend::idle::{HeadPose, IdleMotion};
use crate::blend::{BlendInputs, BlendState, Smoother};
use crate::config::LipSyncConfig;
use crate::driver::SpeechSnapshot;
use crate::emotion::Emotion;
use crate::rig::{MorphTargets, apply_to_all};
use crate::viseme::Viseme;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarSnapshot {
    pub active_emotion: Emotion,
    pub is_talking: bool,
    pub current_viseme: Viseme,
    pub volume: f32,
    pub blend_weights: BTreeMap<String, f32>,
    pub head: HeadPose,
}

pub struct AvatarAnimator {
    smoother: Smoother,
    idle: IdleMotion,
}

impl AvatarAnimator {
    pub fn new(config: &LipSyncConfig) -> Self {
        Self {
            smoother: Smoother::new(&config.smoothing, &config.blink),
            idle: IdleMotion::new(),
        }
    }

    /// Seeded blink clock, for reproducible output.
    pub fn with_seed(config: &LipSyncConfig, seed: u64) -> Self {
        Self {
            smoother: Smoother::with_blink(
                &config.smoothing,
                BlinkState::with_seed(&config.blink, seed),
            ),
            idle: IdleMotion::new(),
        }
    }

    /// Advance one render frame of `delta` seconds.
    pub fn tick(&mut self, delta: f32, speech: &SpeechSnapshot) -> AvatarSnapshot {
        let inputs = BlendInputs {
            emotion: speech.emotion,
            talking: speech.is_talking,
            viseme: speech.viseme,
        };
        let blend_weights = self.smoother.tick(delta, &inputs).weights().clone();
        let head = self.idle.advance(delta, speech.is_talking);

        AvatarSnapshot {
            active_emotion: speech.emotion,
            is_talking: speech.is_talking,
            current_viseme: speech.viseme,
            volume: speech.volume,
            blend_weights,
            head,
        }
    }

    /// Advance one frame and write the weights into every mesh of the rig.
    pub fn tick_rig<M: MorphTargets>(
        &mut self,
        delta: f32,
        speech: &SpeechSnapshot,
        meshes: &mut [M],
    ) -> AvatarSnapshot {
        let snapshot = self.tick(delta, speech);
        apply_to_all(meshes, &snapshot.blend_weights);
        snapshot
    }

    pub fn blend_state(&self) -> &BlendState {
        self.smoother.state()
    }

    pub fn blink(&self) -> &BlinkState {
        self.smoother.blink()
    }
}
