//! Decoding a clip from disk and building its offline viseme timeline.

use crate::helpers::write_speechlike_wav;
use lipsync::audio::decode::decode_audio_file;
use lipsync::config::AnalysisConfig;
use lipsync::sequencer::analysis::analyze_clip;
use lipsync::viseme::Viseme;

#[test]
fn test_clip_timeline_opens_on_the_tone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.wav");
    write_speechlike_wav(&path, 16_000, 0.25, 700.0, 0.75);

    let clip = decode_audio_file(&path).unwrap();
    assert_eq!(clip.sample_rate, 16_000);
    assert_eq!(clip.samples.len(), 16_000);

    let spans = analyze_clip(&clip, &AnalysisConfig::default()).unwrap();
    let first = spans.first().unwrap();
    assert_eq!(first.viseme, Viseme::Sil);
    assert!(first.duration_ms >= 200.0, "{spans:?}");

    let aa: f32 = spans
        .iter()
        .filter(|s| s.viseme == Viseme::AA)
        .map(|s| s.duration_ms)
        .sum();
    assert!(aa > 500.0, "{spans:?}");

    let end = spans.last().map(|s| s.start_ms + s.duration_ms).unwrap();
    assert!((end - 1000.0).abs() < 1.0);
}

#[test]
fn test_low_tone_clip_is_rounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("oo.wav");
    write_speechlike_wav(&path, 16_000, 0.0, 300.0, 0.5);

    let clip = decode_audio_file(&path).unwrap();
    let spans = analyze_clip(&clip, &AnalysisConfig::default()).unwrap();
    assert!(spans.iter().any(|s| s.viseme == Viseme::U), "{spans:?}");
    assert!(!spans.iter().any(|s| s.viseme == Viseme::AA));
}

#[test]
fn test_timeline_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.wav");
    write_speechlike_wav(&path, 8_000, 0.1, 1000.0, 0.2);

    let clip = decode_audio_file(&path).unwrap();
    let spans = analyze_clip(&clip, &AnalysisConfig::default()).unwrap();
    let json = serde_json::to_value(&spans).unwrap();
    assert_eq!(json[0]["viseme"], "viseme_sil");
    assert!(json[0]["start_ms"].is_number());
}
