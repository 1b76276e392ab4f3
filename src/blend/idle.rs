//! Idle head motion: breathing bob, slow sway and a small nod while talking.

use serde::Serialize;

/// Head transform offsets for the current frame, relative to the rest pose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeadPose {
    /// Vertical offset, in scene units.
    pub offset_y: f32,
    /// Rotation about the vertical axis, in radians.
    pub yaw: f32,
    /// Rotation about the lateral axis, in radians.
    pub pitch: f32,
}

#[derive(Debug, Clone, Default)]
pub struct IdleMotion {
    breath_phase: f32,
    head_phase: f32,
    talk_phase: f32,
    pitch: f32,
}

impl IdleMotion {
    const BREATH_SPEED: f32 = 0.5;
    const HEAD_SPEED: f32 = 0.3;
    const TALK_SPEED: f32 = 8.0;
    const PITCH_RELAX_RATE: f32 = 3.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta` seconds.
    pub fn advance(&mut self, delta: f32, talking: bool) -> HeadPose {
        let dt = if delta.is_finite() && delta > 0.0 { delta } else { 0.0 };
        // Keep phases bounded so long sessions do not lose precision.
        self.breath_phase = (self.breath_phase + dt * Self::BREATH_SPEED) % std::f32::consts::TAU;
        self.head_phase = (self.head_phase + dt * Self::HEAD_SPEED) % std::f32::consts::TAU;

        if talking {
            self.talk_phase = (self.talk_phase + dt * Self::TALK_SPEED) % std::f32::consts::TAU;
            self.pitch = self.talk_phase.sin() * 0.01;
        } else {
            self.pitch += (0.0 - self.pitch) * (Self::PITCH_RELAX_RATE * dt).min(1.0);
        }

        HeadPose {
            offset_y: self.breath_phase.sin() * 0.005,
            yaw: self.head_phase.sin() * 0.02,
            pitch: self.pitch,
        }
    }
}
