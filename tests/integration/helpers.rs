//! Shared helpers for integration tests.

use lipsync::rig::MorphMesh;
use lipsync::viseme::Viseme;
use lipsync::{AvatarAnimator, AvatarSnapshot, PlaybackDriver};
use std::time::Duration;

pub(crate) const FRAME: Duration = Duration::from_millis(16);

/// A Ready Player Me style head: every viseme plus the common expression
/// and blink channels.
pub(crate) fn full_head() -> MorphMesh {
    let mut names: Vec<String> = Viseme::ALL
        .iter()
        .map(|v| v.morph_name().to_owned())
        .collect();
    names.extend(
        [
            "mouthSmile",
            "eyeSquintLeft",
            "eyeSquintRight",
            "browInnerUp",
            "eyeBlinkLeft",
            "eyeBlinkRight",
            "jawOpen",
        ]
        .map(str::to_owned),
    );
    MorphMesh::new("Wolf3D_Head", names)
}

/// Render frames in real time until `frames` ticks have passed, returning
/// the last snapshot.
pub(crate) async fn render_for(
    driver: &PlaybackDriver,
    animator: &mut AvatarAnimator,
    meshes: &mut [MorphMesh],
    frames: usize,
) -> AvatarSnapshot {
    let mut ticker = tokio::time::interval(FRAME);
    let mut last = None;
    for _ in 0..frames {
        ticker.tick().await;
        last = Some(animator.tick_rig(FRAME.as_secs_f32(), &driver.snapshot(), meshes));
    }
    last.expect("at least one frame")
}

/// 16-bit mono WAV with `silence_secs` of silence followed by a
/// `tone_hz` tone lasting `tone_secs`.
pub(crate) fn write_speechlike_wav(
    path: &std::path::Path,
    sample_rate: u32,
    silence_secs: f32,
    tone_hz: f32,
    tone_secs: f32,
) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let silent = (silence_secs * sample_rate as f32) as usize;
    let voiced = (tone_secs * sample_rate as f32) as usize;
    for _ in 0..silent {
        writer.write_sample(0i16).unwrap();
    }
    // A little deterministic hiss under the tone, like breath noise.
    let mut hiss: u32 = 0x1234_5678;
    for n in 0..voiced {
        hiss ^= hiss << 13;
        hiss ^= hiss >> 17;
        hiss ^= hiss << 5;
        let noise = (hiss as f32 / u32::MAX as f32 - 0.5) * 0.1;
        let t = n as f32 / sample_rate as f32;
        let s = 0.5 * (std::f32::consts::TAU * tone_hz * t).sin() + noise;
        writer.write_sample((s * 32_000.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}
