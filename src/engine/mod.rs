//! Liveness decision engine.
//!
//! Drives one request's frames through landmark extraction, the eye-state
//! tracker and the motion scorer, then fuses the two signals:
//!
//! ```text
//! media → frames ─┬─ landmarks → eye state ─┬─ fusion → verdict
//!                 └──────────── motion ─────┘
//! ```
//!
//! The engine itself is immutable and can serve many requests at once;
//! all per-request state lives in a [`LivenessSession`].

mod deadline;
mod session;

pub use deadline::Deadline;
pub use session::{LivenessAnalysis, LivenessFlags, LivenessSession};

use std::sync::Arc;

use crate::config::LivenessConfig;
use crate::error::AnalysisError;
use crate::landmarks::LandmarkExtractor;
use crate::media::{fingerprint, Frame, FrameSource, MediaError, MediaKind};
use crate::metrics::MetricsRegistry;

/// Reentrant liveness engine over an injected landmark capability.
pub struct LivenessEngine<E> {
    config: LivenessConfig,
    extractor: E,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<E: LandmarkExtractor> LivenessEngine<E> {
    /// Creates an engine without metrics.
    pub fn new(config: LivenessConfig, extractor: E) -> Self {
        Self {
            config,
            extractor,
            metrics: None,
        }
    }

    /// Records every outcome into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decision constants in use.
    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Starts a session for callers that feed frames themselves.
    pub fn session(&self, deadline: Deadline) -> LivenessSession<'_> {
        LivenessSession::new(&self.extractor, &self.config, deadline)
    }

    /// Decodes `media` as `kind` and analyses every frame.
    pub fn analyze(
        &self,
        media: &[u8],
        kind: MediaKind,
        deadline: &Deadline,
    ) -> Result<LivenessAnalysis, AnalysisError> {
        let digest = fingerprint(media);
        let span = tracing::info_span!("liveness", digest = %&digest[..12], kind = %kind);
        let _enter = span.enter();

        let outcome = FrameSource::decode(media, kind)
            .map_err(AnalysisError::from)
            .and_then(|source| self.run(source, deadline))
            .map(|mut analysis| {
                analysis.media_digest = Some(digest);
                analysis
            });
        self.record(&outcome);
        outcome
    }

    /// Analyses an already decoded frame sequence.
    ///
    /// Frames must arrive in capture order with increasing sequence
    /// numbers. A decode error from the iterator aborts the request.
    pub fn analyze_frames<I>(
        &self,
        frames: I,
        deadline: &Deadline,
    ) -> Result<LivenessAnalysis, AnalysisError>
    where
        I: IntoIterator<Item = Result<Frame, MediaError>>,
    {
        let outcome = self.run(frames, deadline);
        self.record(&outcome);
        outcome
    }

    fn run<I>(&self, frames: I, deadline: &Deadline) -> Result<LivenessAnalysis, AnalysisError>
    where
        I: IntoIterator<Item = Result<Frame, MediaError>>,
    {
        let mut session = self.session(deadline.clone());
        let mut frames = frames.into_iter();

        loop {
            session.check_deadline()?;
            match frames.next() {
                Some(frame) => session.push(frame?)?,
                None => break,
            }
        }

        let analysis = session.finish()?;
        tracing::info!(
            is_live = analysis.result.is_live,
            confidence = analysis.result.confidence,
            frames = analysis.frames_processed,
            blinks = analysis.blink_count(),
            mean_motion = analysis.mean_motion,
            degraded = analysis.flags.degraded_frames,
            "liveness analysed"
        );
        Ok(analysis)
    }

    fn record(&self, outcome: &Result<LivenessAnalysis, AnalysisError>) {
        match outcome {
            Ok(analysis) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_liveness(analysis);
                }
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "liveness request failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(e.kind());
                }
            }
        }
    }
}

impl<E> std::fmt::Debug for LivenessEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessEngine")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::landmarks::{EyeContour, LandmarkSet, NoFaceExtractor, Point, RecordedLandmarks};

    fn gray(value: u8, sequence: u64) -> Result<Frame, MediaError> {
        Ok(Frame::luma(vec![value; 64], 8, 8, sequence))
    }

    fn eye(ear: f64) -> EyeContour {
        let h = ear / 2.0;
        EyeContour([
            Point::new(0.0, 0.0),
            Point::new(0.33, h),
            Point::new(0.66, h),
            Point::new(1.0, 0.0),
            Point::new(0.66, -h),
            Point::new(0.33, -h),
        ])
    }

    fn face(ear: f64) -> Option<LandmarkSet> {
        Some(LandmarkSet::new(eye(ear), eye(ear), 0.9))
    }

    #[test]
    fn test_static_frames_not_live() {
        let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
        let frames = (0..10).map(|i| gray(77, i));
        let analysis = engine.analyze_frames(frames, &Deadline::none()).unwrap();

        assert!(!analysis.result.is_live);
        assert_eq!(analysis.result.confidence, 0.0);
        assert_eq!(analysis.mean_motion, 0.0);
        assert!(analysis.flags.no_face_detected);
    }

    #[test]
    fn test_blink_on_static_frames_is_live() {
        let recording = RecordedLandmarks::new(vec![face(0.30), face(0.18), face(0.30)]);
        let engine = LivenessEngine::new(LivenessConfig::default(), recording);
        let frames = (0..3).map(|i| gray(50, i));
        let analysis = engine.analyze_frames(frames, &Deadline::none()).unwrap();

        assert!(analysis.result.is_live);
        assert_eq!(analysis.blink_count(), 1);
        assert_eq!(analysis.blink_events[0].frame_index, 1);
        assert!((analysis.result.confidence - 0.5).abs() < 1e-12);
        assert_eq!(analysis.frames_with_face, 3);
    }

    #[test]
    fn test_empty_iterator_is_empty_media() {
        let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
        let err = engine
            .analyze_frames(std::iter::empty(), &Deadline::none())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyMedia);
    }

    #[test]
    fn test_decode_error_mid_stream_aborts() {
        let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
        let frames = vec![
            gray(0, 0),
            Err(MediaError::Decode {
                kind: MediaKind::Video,
                reason: "corrupt frame".into(),
            }),
            gray(255, 2),
        ];
        let err = engine.analyze_frames(frames, &Deadline::none()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_expired_deadline_never_returns_partial_verdict() {
        let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
        let deadline = Deadline::at(std::time::Instant::now());
        let err = engine
            .analyze_frames((0..5).map(|i| gray(i as u8 * 40, i)), &deadline)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MediaTimeout { frames: 0 }));
    }

    #[test]
    fn test_metrics_recorded() {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor)
            .with_metrics(Arc::clone(&metrics));

        engine
            .analyze_frames((0..2).map(|i| gray(i as u8 * 100, i)), &Deadline::none())
            .unwrap();
        let _ = engine.analyze(b"not media", MediaKind::Video, &Deadline::none());

        let output = metrics.encode().unwrap();
        assert!(output.contains("antifraud_liveness_analyses_total 1"));
        assert!(output.contains("antifraud_liveness_live_total 1"));
        assert!(output.contains(r#"antifraud_request_failures_total{kind="decode_error"} 1"#));
    }
}
