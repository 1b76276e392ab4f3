//! Blend engine: continuous morph weights from discrete speech and
//! expression state.
//!
//! Each tick, channels nobody is targeting relax toward zero, the active
//! emotion's table and the active viseme pull their channels toward their
//! targets, and the blink curve drives the eyelids. Every group has its own
//! rate so speech visibly overrides a resting expression without either
//! snapping.
//!
//! Channels are blended per name with no priority between groups: a frown
//! and an open jaw coexist if both are targeted.

pub mod blink;
pub mod idle;

use crate::config::{BlinkConfig, SmoothingConfig};
use crate::emotion::Emotion;
use crate::viseme::Viseme;
use blink::{BLINK_CHANNELS, BlinkState};
use std::collections::{BTreeMap, HashSet};

/// Current weight of every channel the engine has touched.
///
/// Weights are always finite and within `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendState {
    weights: BTreeMap<String, f32>,
}

impl BlendState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of `channel`, or zero if it has never been targeted.
    pub fn get(&self, channel: &str) -> f32 {
        self.weights.get(channel).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &BTreeMap<String, f32> {
        &self.weights
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn set(&mut self, channel: &str, weight: f32) {
        let w = sanitize(weight);
        match self.weights.get_mut(channel) {
            Some(slot) => *slot = w,
            None => {
                self.weights.insert(channel.to_owned(), w);
            }
        }
    }

    fn approach(&mut self, channel: &str, target: f32, alpha: f32) {
        let current = self.get(channel);
        self.set(channel, current + (target - current) * alpha);
    }
}

fn sanitize(weight: f32) -> f32 {
    if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// What the face should be doing this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlendInputs {
    pub emotion: Emotion,
    pub talking: bool,
    pub viseme: Viseme,
}

/// Sole owner and writer of a rig's [`BlendState`] and [`BlinkState`].
#[derive(Debug, Clone)]
pub struct Smoother {
    rates: SmoothingConfig,
    state: BlendState,
    blink: BlinkState,
}

impl Smoother {
    pub fn new(rates: &SmoothingConfig, blink: &BlinkConfig) -> Self {
        Self::with_blink(rates, BlinkState::new(blink))
    }

    /// Use a prepared blink clock, e.g. a seeded one in tests.
    pub fn with_blink(rates: &SmoothingConfig, blink: BlinkState) -> Self {
        Self {
            rates: rates.clone(),
            state: BlendState::new(),
            blink,
        }
    }

    pub fn state(&self) -> &BlendState {
        &self.state
    }

    pub fn blink(&self) -> &BlinkState {
        &self.blink
    }

    /// Advance the blend by `delta` seconds.
    ///
    /// A negative or non-finite `delta` is treated as zero.
    pub fn tick(&mut self, delta: f32, inputs: &BlendInputs) -> &BlendState {
        let dt = if delta.is_finite() && delta > 0.0 { delta } else { 0.0 };
        let eyelids = self.blink.advance(dt);

        let emotion_targets = inputs.emotion.targets();
        let viseme_channel = inputs.talking.then(|| inputs.viseme.morph_name());

        let mut targeted: HashSet<&str> = emotion_targets.iter().map(|(name, _)| *name).collect();
        targeted.extend(viseme_channel);
        if eyelids.is_some() {
            targeted.extend(BLINK_CHANNELS);
        }

        // Relax untargeted channels first so targets are approached from
        // wherever they were, never snapped to.
        let decay = alpha(self.rates.decay_rate, dt);
        for (name, weight) in self.state.weights.iter_mut() {
            if !targeted.contains(name.as_str()) {
                *weight = sanitize(*weight * (1.0 - decay));
            }
        }

        let pull = alpha(self.rates.emotion_rate, dt);
        for (name, target) in emotion_targets {
            self.state.approach(name, *target, pull);
        }

        if let Some(channel) = viseme_channel {
            self.state
                .approach(channel, 1.0, alpha(self.rates.viseme_rate, dt));
        }

        if let Some(weight) = eyelids {
            for channel in BLINK_CHANNELS {
                self.state.set(channel, weight);
            }
        }

        &self.state
    }
}

fn alpha(rate: f32, dt: f32) -> f32 {
    let a = rate * dt;
    if a.is_finite() { a.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use proptest::prelude::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn quiet_smoother() -> Smoother {
        let blink = BlinkConfig {
            enabled: false,
            ..BlinkConfig::default()
        };
        Smoother::with_blink(&SmoothingConfig::default(), BlinkState::with_seed(&blink, 0))
    }

    fn run(smoother: &mut Smoother, inputs: &BlendInputs, seconds: f32) {
        let ticks = (seconds / FRAME).round() as usize;
        for _ in 0..ticks {
            smoother.tick(FRAME, inputs);
        }
    }

    #[test]
    fn happy_settles_on_its_table() {
        // Blink enabled: the first blink is at least 2 s away.
        let mut smoother = Smoother::with_blink(
            &SmoothingConfig::default(),
            BlinkState::with_seed(&BlinkConfig::default(), 11),
        );
        let talking = BlendInputs {
            emotion: Emotion::Neutral,
            talking: true,
            viseme: Viseme::AA,
        };
        run(&mut smoother, &talking, 0.3);
        assert!(smoother.state().get("viseme_aa") > 0.9);

        let happy = BlendInputs {
            emotion: Emotion::Happy,
            talking: false,
            viseme: Viseme::Sil,
        };
        run(&mut smoother, &happy, 1.5);
        let state = smoother.state();
        assert!((state.get("mouthSmile") - 0.7).abs() < 0.05);
        for (name, target) in Emotion::Happy.targets() {
            assert!((state.get(name) - target).abs() < 0.05, "{name}");
        }
        let happy_channels: Vec<&str> = Emotion::Happy.targets().iter().map(|(n, _)| *n).collect();
        for (name, weight) in state.iter() {
            if !happy_channels.contains(&name) {
                assert!(weight < 0.05, "{name} stuck at {weight}");
            }
        }
    }

    #[test]
    fn viseme_outpaces_emotion() {
        let mut smoother = quiet_smoother();
        let inputs = BlendInputs {
            emotion: Emotion::Sad,
            talking: true,
            viseme: Viseme::O,
        };
        smoother.tick(0.05, &inputs);
        let state = smoother.state();
        assert!(state.get("viseme_O") > state.get("browInnerUp"));
        assert!(state.get("viseme_O") > 0.0);
        assert!(state.get("browInnerUp") > 0.0);
    }

    #[test]
    fn silence_is_a_target_while_talking() {
        let mut smoother = quiet_smoother();
        let inputs = BlendInputs {
            talking: true,
            ..BlendInputs::default()
        };
        run(&mut smoother, &inputs, 0.5);
        assert!(smoother.state().get("viseme_sil") > 0.9);
    }

    #[test]
    fn visemes_relax_when_talking_stops() {
        let mut smoother = quiet_smoother();
        let talking = BlendInputs {
            talking: true,
            viseme: Viseme::E,
            ..BlendInputs::default()
        };
        run(&mut smoother, &talking, 0.5);
        run(&mut smoother, &BlendInputs::default(), 1.0);
        assert!(smoother.state().iter().all(|(_, w)| w < 0.01));
    }

    #[test]
    fn changing_target_is_smooth() {
        let mut smoother = quiet_smoother();
        let inputs = BlendInputs {
            talking: true,
            viseme: Viseme::PP,
            ..BlendInputs::default()
        };
        smoother.tick(FRAME, &inputs);
        // One frame at rate 15 covers a quarter of the distance.
        assert!((smoother.state().get("viseme_PP") - 0.25).abs() < 1e-4);
    }

    #[test]
    fn zero_and_bad_delta_change_nothing() {
        let mut smoother = quiet_smoother();
        let inputs = BlendInputs {
            emotion: Emotion::Angry,
            talking: true,
            viseme: Viseme::FF,
        };
        run(&mut smoother, &inputs, 0.2);
        let before = smoother.state().clone();
        smoother.tick(0.0, &inputs);
        smoother.tick(-3.0, &inputs);
        smoother.tick(f32::NAN, &inputs);
        smoother.tick(f32::INFINITY, &inputs);
        assert_eq!(&before, smoother.state());
    }

    #[test]
    fn blink_relaxes_after_it_ends() {
        let eager = BlinkConfig {
            min_interval_secs: 0.0,
            max_interval_secs: 0.0,
            ..BlinkConfig::default()
        };
        let mut smoother =
            Smoother::with_blink(&SmoothingConfig::default(), BlinkState::with_seed(&eager, 4));
        let idle = BlendInputs::default();
        smoother.tick(0.06, &idle);
        assert!(smoother.blink().is_blinking());
        assert!(smoother.state().get("eyeBlinkLeft") > 0.5);

        // Finish the blink, then let the eyelids relax before the next one.
        while smoother.blink().is_blinking() {
            smoother.tick(0.01, &idle);
        }
        assert!(smoother.state().get("eyeBlinkRight") < 0.5);
    }

    fn arb_inputs() -> impl Strategy<Value = BlendInputs> {
        (0u8..6, any::<bool>(), 0u8..15).prop_map(|(e, talking, v)| BlendInputs {
            emotion: Emotion::from_id(e).unwrap(),
            talking,
            viseme: Viseme::from_id(v).unwrap(),
        })
    }

    fn arb_delta() -> impl Strategy<Value = f32> {
        prop_oneof![
            0.0f32..0.1,
            0.0f32..10.0,
            Just(0.0),
            Just(f32::NAN),
            Just(f32::INFINITY),
            Just(-1.0),
        ]
    }

    proptest! {
        #[test]
        fn weights_stay_in_unit_range(
            steps in prop::collection::vec((arb_delta(), arb_inputs()), 1..200),
            seed in any::<u64>(),
        ) {
            let eager = BlinkConfig { min_interval_secs: 0.0, max_interval_secs: 0.5, ..BlinkConfig::default() };
            let mut smoother =
                Smoother::with_blink(&SmoothingConfig::default(), BlinkState::with_seed(&eager, seed));
            for (delta, inputs) in &steps {
                for (name, w) in smoother.tick(*delta, inputs).iter() {
                    prop_assert!((0.0..=1.0).contains(&w), "{} = {}", name, w);
                }
            }
        }
    }
}
