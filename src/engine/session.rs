//! Per-request liveness state.

use serde::{Deserialize, Serialize};

use super::Deadline;
use crate::config::LivenessConfig;
use crate::error::AnalysisError;
use crate::fusion::{LivenessFusion, LivenessResult};
use crate::landmarks::LandmarkExtractor;
use crate::media::{Frame, MediaError};
use crate::tracking::{BlinkEvent, EyeStateTracker, MotionScorer};

/// Diagnostic flags attached to a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessFlags {
    /// No frame produced usable landmarks.
    pub no_face_detected: bool,
    /// Exactly one frame was available, so no motion could be measured.
    pub static_image: bool,
    /// Frames whose landmark call failed or timed out.
    pub degraded_frames: u64,
}

/// A liveness verdict with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessAnalysis {
    /// The verdict.
    pub result: LivenessResult,
    /// Frames decoded and scored.
    pub frames_processed: u64,
    /// Frames that contributed an EAR sample.
    pub frames_with_face: u64,
    /// Blinks in detection order.
    pub blink_events: Vec<BlinkEvent>,
    /// Mean inter-frame difference, 0.0 for a single frame.
    pub mean_motion: f64,
    /// Conditions worth surfacing next to the verdict.
    pub flags: LivenessFlags,
    /// BLAKE3 hex digest of the analysed bytes, when analysed from bytes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_digest: Option<String>,
}

impl LivenessAnalysis {
    /// Number of blinks detected.
    pub fn blink_count(&self) -> usize {
        self.blink_events.len()
    }
}

/// Processing context for one request.
///
/// Frames must be pushed in capture order. The session is consumed by
/// [`finish`](Self::finish); nothing in it outlives the request.
pub struct LivenessSession<'a> {
    extractor: &'a dyn LandmarkExtractor,
    fusion: LivenessFusion,
    eyes: EyeStateTracker,
    motion: MotionScorer,
    deadline: Deadline,
    frames_processed: u64,
    degraded_frames: u64,
}

impl<'a> LivenessSession<'a> {
    /// Starts an empty session.
    pub fn new(
        extractor: &'a dyn LandmarkExtractor,
        config: &LivenessConfig,
        deadline: Deadline,
    ) -> Self {
        Self {
            extractor,
            fusion: LivenessFusion::new(config),
            eyes: EyeStateTracker::new(config),
            motion: MotionScorer::new(),
            deadline,
            frames_processed: 0,
            degraded_frames: 0,
        }
    }

    /// Fails with `MediaTimeout` if the request deadline has fired.
    pub fn check_deadline(&self) -> Result<(), AnalysisError> {
        self.deadline.check(self.frames_processed)
    }

    /// Feeds the next frame through both trackers.
    ///
    /// A per-frame capability failure is treated as "no landmarks" for that
    /// frame; an unavailable capability fails the request.
    pub fn push(&mut self, frame: Frame) -> Result<(), AnalysisError> {
        let landmarks = match self.extractor.extract(&frame) {
            Ok(found) => found,
            Err(e) if e.is_systemic() => {
                tracing::error!(sequence = frame.sequence(), error = %e, "landmark capability down");
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(sequence = frame.sequence(), error = %e, "frame degraded");
                self.degraded_frames += 1;
                None
            }
        };

        self.eyes.observe(&frame, landmarks.as_ref());
        self.motion.observe(frame);
        self.frames_processed += 1;
        Ok(())
    }

    /// Frames pushed so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Blinks detected so far.
    pub fn blink_count(&self) -> usize {
        self.eyes.blink_count()
    }

    /// Fuses the accumulated signals into a verdict.
    pub fn finish(self) -> Result<LivenessAnalysis, AnalysisError> {
        if self.frames_processed == 0 {
            return Err(MediaError::Empty.into());
        }

        let mean_motion = self.motion.mean_motion();
        let frames_with_face = self.eyes.frames_with_face();
        let blink_events = self.eyes.into_blinks();
        let result = self.fusion.fuse(blink_events.len(), mean_motion);

        Ok(LivenessAnalysis {
            result,
            frames_processed: self.frames_processed,
            frames_with_face,
            blink_events,
            mean_motion,
            flags: LivenessFlags {
                no_face_detected: frames_with_face == 0,
                static_image: self.frames_processed == 1,
                degraded_frames: self.degraded_frames,
            },
            media_digest: None,
        })
    }
}

impl std::fmt::Debug for LivenessSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessSession")
            .field("frames_processed", &self.frames_processed)
            .field("blinks", &self.eyes.blink_count())
            .field("degraded_frames", &self.degraded_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{CapabilityError, LandmarkSet, NoFaceExtractor};

    struct Failing(CapabilityError);

    impl LandmarkExtractor for Failing {
        fn extract(&self, _frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
            Err(self.0.clone())
        }
    }

    fn gray(value: u8, sequence: u64) -> Frame {
        Frame::luma(vec![value; 16], 4, 4, sequence)
    }

    #[test]
    fn test_finish_without_frames_is_empty_media() {
        let session = LivenessSession::new(&NoFaceExtractor, &LivenessConfig::default(), Deadline::none());
        assert!(matches!(
            session.finish(),
            Err(AnalysisError::Media(MediaError::Empty))
        ));
    }

    #[test]
    fn test_single_frame_flags() {
        let mut session =
            LivenessSession::new(&NoFaceExtractor, &LivenessConfig::default(), Deadline::none());
        session.push(gray(90, 0)).unwrap();
        let analysis = session.finish().unwrap();

        assert_eq!(analysis.result, LivenessResult::NOT_LIVE);
        assert!(analysis.flags.static_image);
        assert!(analysis.flags.no_face_detected);
        assert_eq!(analysis.frames_processed, 1);
    }

    #[test]
    fn test_per_frame_failures_degrade() {
        let extractor = Failing(CapabilityError::Timeout { sequence: 0 });
        let mut session = LivenessSession::new(&extractor, &LivenessConfig::default(), Deadline::none());
        session.push(gray(0, 0)).unwrap();
        session.push(gray(100, 1)).unwrap();
        let analysis = session.finish().unwrap();

        assert_eq!(analysis.flags.degraded_frames, 2);
        // Motion still counts when landmarks fail
        assert!(analysis.result.is_live);
    }

    #[test]
    fn test_unavailable_capability_is_fatal() {
        let extractor = Failing(CapabilityError::Unavailable("model not loaded".into()));
        let mut session = LivenessSession::new(&extractor, &LivenessConfig::default(), Deadline::none());
        assert!(matches!(
            session.push(gray(0, 0)),
            Err(AnalysisError::CapabilityUnavailable(_))
        ));
    }

    #[test]
    fn test_serialized_analysis_has_result_fields() {
        let mut session =
            LivenessSession::new(&NoFaceExtractor, &LivenessConfig::default(), Deadline::none());
        session.push(gray(0, 0)).unwrap();
        let json = serde_json::to_value(session.finish().unwrap()).unwrap();

        assert_eq!(json["result"], serde_json::json!({"is_live": false, "confidence": 0.0}));
        assert!(json.get("media_digest").is_none());
        assert_eq!(json["flags"]["static_image"], true);
    }
}
