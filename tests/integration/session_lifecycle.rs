//! End-to-end: driver sessions feeding the animator and a morph rig.

use crate::helpers::{FRAME, full_head, render_for};
use lipsync::audio::AudioFrame;
use lipsync::viseme::Viseme;
use lipsync::{
    AvatarAnimator, Emotion, LipSyncConfig, LipSyncEvent, ModeKind, PlaybackDriver,
    SessionOutcome, SpeechInput,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_text_session_drives_rig_then_settles() {
    let mut config = LipSyncConfig::default();
    config.driver.emotion_reset_ms = 0;
    let driver = PlaybackDriver::new(config.clone());
    let mut animator = AvatarAnimator::with_seed(&config, 21);
    let mut meshes = vec![full_head()];

    driver.set_emotion(Emotion::Happy);
    let handle = driver.start(SpeechInput::text("hola", 0.4));

    let speaking = render_for(&driver, &mut animator, &mut meshes, 10).await;
    assert!(speaking.is_talking);
    let mouth_moving = Viseme::ALL
        .iter()
        .filter(|v| **v != Viseme::Sil)
        .any(|v| meshes[0].influence(v.morph_name()).unwrap() > 0.1);
    assert!(mouth_moving);

    assert_eq!(
        timeout(WAIT, handle.finished()).await.unwrap(),
        SessionOutcome::Completed
    );

    let settled = render_for(&driver, &mut animator, &mut meshes, 90).await;
    assert!(!settled.is_talking);
    assert_eq!(settled.current_viseme, Viseme::Sil);
    assert!((meshes[0].influence("mouthSmile").unwrap() - 0.7).abs() < 0.05);
    for viseme in Viseme::ALL {
        assert!(
            meshes[0].influence(viseme.morph_name()).unwrap() < 0.05,
            "{viseme} still open"
        );
    }
}

#[tokio::test]
async fn test_audio_end_mid_blink_does_not_freeze_eyelids() {
    let mut config = LipSyncConfig::default();
    config.blink.min_interval_secs = 0.5;
    config.blink.max_interval_secs = 0.5;
    let driver = PlaybackDriver::new(config.clone());
    let mut animator = AvatarAnimator::with_seed(&config, 8);
    let dt = FRAME.as_secs_f32();

    let _handle = driver.start(SpeechInput::text("a fairly long answer", 30.0));
    let mut guard = 0;
    while !animator.blink().is_blinking() {
        animator.tick(dt, &driver.snapshot());
        guard += 1;
        assert!(guard < 100, "blink never started");
    }
    let progress_at_stop = animator.blink().progress();

    driver.stop();
    let after = animator.tick(dt, &driver.snapshot());
    assert_eq!(after.current_viseme, Viseme::Sil);
    assert!(!after.is_talking);
    // The curve keeps running rather than being cut off.
    assert!(animator.blink().is_blinking());
    assert!(animator.blink().progress() > progress_at_stop);

    while animator.blink().is_blinking() {
        animator.tick(dt, &driver.snapshot());
    }
    let mut last = after;
    for _ in 0..19 {
        last = animator.tick(dt, &driver.snapshot());
    }
    assert!(last.blend_weights["eyeBlinkLeft"] < 0.05);
    assert!(last.blend_weights["eyeBlinkRight"] < 0.05);
}

#[tokio::test]
async fn test_renderer_never_sees_half_torn_down_session() {
    let driver = PlaybackDriver::new(LipSyncConfig::default());
    let running = Arc::new(AtomicBool::new(true));

    let observer = {
        let driver = driver.clone();
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            let mut observed = 0usize;
            while running.load(Ordering::Relaxed) {
                let snap = driver.snapshot();
                if !snap.is_talking {
                    assert_eq!(snap.viseme, Viseme::Sil);
                    assert_eq!(snap.volume, 0.0);
                }
                if snap.session.is_none() {
                    assert!(!snap.is_talking);
                }
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    for i in 0..20 {
        let handle = driver.start(SpeechInput::text("abcdefghij", 0.5));
        tokio::time::sleep(Duration::from_millis(7 + i % 5)).await;
        if i % 2 == 0 {
            driver.stop();
        }
        drop(handle);
    }
    driver.stop();
    running.store(false, Ordering::Relaxed);
    assert!(observer.await.unwrap() > 0);
}

#[tokio::test]
async fn test_rapid_restarts_settle_every_session() {
    let driver = PlaybackDriver::new(LipSyncConfig::default());
    let mut events = driver.subscribe();
    let handles: Vec<_> = (0..10)
        .map(|_| driver.start(SpeechInput::text("again", 10.0)))
        .collect();
    let last_id = handles.last().unwrap().id();
    assert_eq!(driver.active_session(), Some(last_id));

    driver.stop();
    for handle in handles {
        assert_eq!(
            timeout(WAIT, handle.finished()).await.unwrap(),
            SessionOutcome::Stopped
        );
    }

    let mut started = 0;
    let mut ended = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            LipSyncEvent::SessionStarted { .. } => started += 1,
            LipSyncEvent::SessionEnded { .. } => ended += 1,
            _ => {}
        }
    }
    assert_eq!(started, 10);
    assert_eq!(ended, 10);
}

#[tokio::test]
async fn test_tapped_clip_drives_analysis_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reply.wav");
    crate::helpers::write_speechlike_wav(&path, 16_000, 0.1, 700.0, 0.5);
    let clip = lipsync::audio::decode::decode_audio_file(&path).unwrap();

    let driver = PlaybackDriver::new(LipSyncConfig::default());
    let mut events = driver.subscribe();
    let (tap, frames) = mpsc::channel(256);
    let handle = driver.start(SpeechInput::audio(frames));
    assert_eq!(handle.mode(), ModeKind::Analysis);

    // Stamp chunks as a playback tap would, 32 ms apart.
    let base = Instant::now();
    for (i, chunk) in clip.samples.chunks(512).enumerate() {
        tap.send(AudioFrame {
            samples: chunk.to_vec(),
            sample_rate: clip.sample_rate,
            captured_at: base + Duration::from_millis(32 * i as u64),
        })
        .await
        .unwrap();
    }
    drop(tap);

    assert_eq!(
        timeout(WAIT, handle.finished()).await.unwrap(),
        SessionOutcome::Completed
    );
    let mut visemes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LipSyncEvent::Viseme { viseme, .. } = event {
            visemes.push(viseme);
        }
    }
    assert!(visemes.contains(&Viseme::AA), "{visemes:?}");
    assert_eq!(driver.snapshot().viseme, Viseme::Sil);
}
