//! Config files as a user would write them.

use lipsync::viseme::Viseme;
use lipsync::{LipSyncConfig, LipSyncError, PlaybackDriver, SpeechInput};
use std::time::Duration;

#[test]
fn test_hand_written_config_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[sequencer]
min_interval_ms = 80

[analysis]
fft_size = 512
noise_floor = 0.2

[simulated]
palette = ["viseme_aa", "viseme_O"]

[smoothing]
viseme_rate = 12.0

[blink]
enabled = false

[driver]
emotion_reset_ms = 0
"#,
    )
    .unwrap();

    let config = LipSyncConfig::from_file(&path).unwrap();
    assert_eq!(config.sequencer.min_interval(), Duration::from_millis(80));
    assert_eq!(config.analysis.fft_size, 512);
    assert!((config.analysis.noise_floor - 0.2).abs() < f32::EPSILON);
    assert!((config.analysis.smoothing_time_constant - 0.8).abs() < f32::EPSILON);
    assert_eq!(config.simulated.palette, vec![Viseme::AA, Viseme::O]);
    assert!(!config.blink.enabled);
    assert_eq!(config.driver.emotion_reset_ms, 0);
    assert_eq!(config.audio.tap_chunk_frames, 512);
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[analysis]\nfft_size = 1000\n").unwrap();
    assert!(matches!(
        LipSyncConfig::from_file(&path),
        Err(LipSyncError::Config(_))
    ));

    std::fs::write(&path, "[simulated]\npalette = [\"viseme_zz\"]\n").unwrap();
    assert!(matches!(
        LipSyncConfig::from_file(&path),
        Err(LipSyncError::Config(_))
    ));
}

#[test]
fn test_saved_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lipsync").join("config.toml");
    let mut config = LipSyncConfig::default();
    config.blink.speed = 10.0;
    config.audio.output_device = Some("Speakers".into());
    config.save_to_file(&path).unwrap();

    let loaded = LipSyncConfig::from_file(&path).unwrap();
    assert!((loaded.blink.speed - 10.0).abs() < f32::EPSILON);
    assert_eq!(loaded.audio.output_device.as_deref(), Some("Speakers"));
}

#[tokio::test]
async fn test_min_interval_from_config_reaches_the_driver() {
    let mut config = LipSyncConfig::default();
    config.sequencer.min_interval_ms = 30;
    let driver = PlaybackDriver::new(config);
    let mut events = driver.subscribe();

    // 10 chars over 0.1 s would be 10 ms apart without the floor.
    let started = std::time::Instant::now();
    let handle = driver.start(SpeechInput::text("abcdefghij", 0.1));
    handle.finished().await;
    assert!(started.elapsed() >= Duration::from_millis(300));

    let visemes = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, lipsync::LipSyncEvent::Viseme { .. }))
        .count();
    assert_eq!(visemes, 10);
}
