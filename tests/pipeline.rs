//! End-to-end liveness and verification over synthetic media.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use antifraud_liveness::landmarks::{EyeContour, Point};
use antifraud_liveness::{
    AnalysisError, AttributeScores, CapabilityError, Deadline, ErrorKind, Frame,
    IdentityVerifier, LandmarkExtractor, LandmarkSet, LivenessConfig, LivenessEngine, MediaKind,
    NoFaceExtractor, RecordedLandmarks, RecordedScores, TimeLimited, VerificationConfig,
};
use image::codecs::gif::GifEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};

/// Animated GIF with one uniform 16x16 frame per shade.
fn gif(shades: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        let frames = shades
            .iter()
            .map(|&s| image::Frame::new(RgbaImage::from_pixel(16, 16, Rgba([s, s, s, 255]))));
        encoder.encode_frames(frames).unwrap();
    }
    buf
}

fn png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([(x * 16) as u8, (y * 16) as u8, 90]));
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), 16, 16, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn eye(ear: f64) -> EyeContour {
    let h = ear / 2.0;
    EyeContour([
        Point::new(10.0, 10.0),
        Point::new(10.33, 10.0 + h),
        Point::new(10.66, 10.0 + h),
        Point::new(11.0, 10.0),
        Point::new(10.66, 10.0 - h),
        Point::new(10.33, 10.0 - h),
    ])
}

fn face(ear: f64) -> Option<LandmarkSet> {
    Some(LandmarkSet::new(eye(ear), eye(ear), 0.95))
}

struct Offline;

impl LandmarkExtractor for Offline {
    fn extract(&self, _frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        Err(CapabilityError::Unavailable("landmark service unreachable".into()))
    }
}

#[test]
fn static_video_is_not_live() {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let analysis = engine
        .analyze(&gif(&[120; 8]), MediaKind::Video, &Deadline::none())
        .unwrap();

    assert_eq!(analysis.frames_processed, 8);
    assert_eq!(analysis.mean_motion, 0.0);
    assert!(!analysis.result.is_live);
    assert_eq!(analysis.result.confidence, 0.0);
}

#[test]
fn single_still_is_not_live() {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let analysis = engine
        .analyze(&png(), MediaKind::Still, &Deadline::none())
        .unwrap();

    assert_eq!(analysis.frames_processed, 1);
    assert_eq!(analysis.blink_count(), 0);
    assert_eq!(analysis.mean_motion, 0.0);
    assert!(!analysis.result.is_live);
    assert!(analysis.flags.static_image);
}

#[test]
fn moving_video_is_live_without_faces() {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let analysis = engine
        .analyze(&gif(&[0, 60, 0, 60]), MediaKind::Video, &Deadline::none())
        .unwrap();

    assert!(analysis.mean_motion > 0.02);
    assert!(analysis.result.is_live);
    assert!(analysis.flags.no_face_detected);
}

#[test]
fn blinking_face_is_live() {
    let recording = RecordedLandmarks::new(vec![
        face(0.31),
        face(0.30),
        face(0.12),
        None,
        face(0.29),
    ]);
    let engine = LivenessEngine::new(LivenessConfig::default(), recording);
    let analysis = engine
        .analyze(&gif(&[90; 5]), MediaKind::Video, &Deadline::none())
        .unwrap();

    assert_eq!(analysis.blink_count(), 1);
    assert_eq!(analysis.blink_events[0].frame_index, 2);
    assert_eq!(analysis.frames_with_face, 4);
    assert!(analysis.result.is_live);
    assert!((analysis.result.confidence - 0.5).abs() < 1e-12);
}

#[test]
fn landmarks_from_sidecar_json() {
    let json = r#"[
        {"left_eye": [[0,0],[0.33,0.15],[0.66,0.15],[1,0],[0.66,-0.15],[0.33,-0.15]],
         "right_eye": [[0,0],[0.33,0.15],[0.66,0.15],[1,0],[0.66,-0.15],[0.33,-0.15]]},
        {"left_eye": [[0,0],[0.33,0.05],[0.66,0.05],[1,0],[0.66,-0.05],[0.33,-0.05]],
         "right_eye": [[0,0],[0.33,0.05],[0.66,0.05],[1,0],[0.66,-0.05],[0.33,-0.05]],
         "confidence": 0.8},
        null
    ]"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.gif.landmarks.json");
    std::fs::write(&path, json).unwrap();

    let recording = RecordedLandmarks::from_file(&path).unwrap();
    let engine = LivenessEngine::new(LivenessConfig::default(), recording);
    let analysis = engine
        .analyze(&gif(&[40; 3]), MediaKind::Video, &Deadline::none())
        .unwrap();

    assert_eq!(analysis.blink_count(), 1);
    assert!(analysis.result.is_live);
}

#[test]
fn same_bytes_same_analysis() {
    let bytes = gif(&[10, 30, 25, 80, 80, 12]);
    let recording = RecordedLandmarks::new(vec![
        face(0.31),
        face(0.12),
        face(0.30),
        None,
        face(0.29),
        face(0.10),
    ]);
    let engine = LivenessEngine::new(LivenessConfig::default(), recording);

    let first = engine.analyze(&bytes, MediaKind::Video, &Deadline::none()).unwrap();
    let second = engine.analyze(&bytes, MediaKind::Video, &Deadline::none()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.blink_count(), 2);
    assert_eq!(first.frames_with_face, 5);
    assert_eq!(first.media_digest.as_deref().map(str::len), Some(64));
}

#[test]
fn truncated_media_is_decode_error() {
    let bytes = gif(&[0, 255, 0, 255]);
    let truncated = &bytes[..bytes.len() / 3];
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);

    let err = engine
        .analyze(truncated, MediaKind::Video, &Deadline::none())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}

#[test]
fn unknown_container_is_decode_error() {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let err = engine
        .analyze(b"\x00\x00\x00\x18ftypmp42", MediaKind::Video, &Deadline::none())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}

#[test]
fn unavailable_capability_fails_request() {
    let engine = LivenessEngine::new(LivenessConfig::default(), Offline);
    let err = engine
        .analyze(&gif(&[0, 100]), MediaKind::Video, &Deadline::none())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::CapabilityUnavailable(_)));
}

#[test]
fn aborted_request_is_media_timeout() {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let deadline = Deadline::none().with_abort_flag(Arc::new(AtomicBool::new(true)));

    let err = engine
        .analyze(&gif(&[0, 100, 0]), MediaKind::Video, &deadline)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MediaTimeout);
}

#[test]
fn time_limited_recording_matches_direct() {
    let recording = RecordedLandmarks::new(vec![face(0.3), face(0.1), face(0.3)]);
    let bounded = TimeLimited::extractor(recording.clone(), Duration::from_secs(5)).unwrap();
    let bytes = gif(&[50, 52, 54]);

    let direct = LivenessEngine::new(LivenessConfig::default(), recording)
        .analyze(&bytes, MediaKind::Video, &Deadline::none())
        .unwrap();
    let worker = LivenessEngine::new(LivenessConfig::default(), bounded)
        .analyze(&bytes, MediaKind::Video, &Deadline::none())
        .unwrap();

    assert_eq!(direct, worker);
}

#[test]
fn verification_uses_first_video_frame() {
    let mut scores = AttributeScores::new();
    scores.insert("neutral", 71.0);
    scores.insert("happy", 29.0);
    let verifier = IdentityVerifier::new(VerificationConfig::default(), RecordedScores::new(Some(scores)));

    let outcome = verifier.verify(&gif(&[0, 255]), MediaKind::Video).unwrap();
    assert!(outcome.result.is_match);
    assert!((outcome.result.confidence - 0.71).abs() < 1e-12);
    assert_eq!(outcome.best_attribute.as_deref(), Some("neutral"));
    assert!(outcome.media_digest.is_some());
}

#[test]
fn verification_without_face_is_no_match() {
    let verifier = IdentityVerifier::new(VerificationConfig::default(), RecordedScores::new(None));
    let outcome = verifier.verify(&png(), MediaKind::Still).unwrap();

    assert!(!outcome.result.is_match);
    assert_eq!(outcome.result.confidence, 0.0);
}
