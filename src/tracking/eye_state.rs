//! Eye-closure tracking and blink detection.
//!
//! Each frame with landmarks contributes one eye-aspect-ratio (EAR)
//! sample. A blink is counted when the previous sample was clearly open
//! and the current one is clearly closed. Using two thresholds instead of
//! one keeps jitter around a single cutoff from being counted repeatedly.
//!
//! Frames without landmarks are skipped and leave the previous sample in
//! place, so a momentary detection dropout does not break a closing trend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LivenessConfig;
use crate::landmarks::{EyeContour, LandmarkSet};
use crate::media::Frame;

/// Guards the EAR denominator against near-collinear contours.
pub const EAR_EPSILON: f64 = 1e-6;

/// Computes the eye aspect ratio of one contour.
///
/// `(|p2-p6| + |p3-p5|) / (2 |p1-p4| + eps)`
pub fn eye_aspect_ratio(eye: &EyeContour) -> f64 {
    let vertical = eye.p(2).distance(eye.p(6)) + eye.p(3).distance(eye.p(5));
    let horizontal = eye.p(1).distance(eye.p(4));
    vertical / (2.0 * horizontal + EAR_EPSILON)
}

/// Which eye the EAR signal is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeSelection {
    /// Left eye only.
    #[default]
    Left,
    /// Right eye only.
    Right,
    /// Average of both eyes.
    Mean,
}

impl EyeSelection {
    /// EAR of the selected eye(s) for one landmark set.
    pub fn ear(self, landmarks: &LandmarkSet) -> f64 {
        match self {
            EyeSelection::Left => eye_aspect_ratio(&landmarks.left_eye),
            EyeSelection::Right => eye_aspect_ratio(&landmarks.right_eye),
            EyeSelection::Mean => {
                (eye_aspect_ratio(&landmarks.left_eye) + eye_aspect_ratio(&landmarks.right_eye))
                    / 2.0
            }
        }
    }
}

/// One EAR measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarSample {
    /// Frame the sample was taken from.
    pub frame_index: u64,
    /// Eye aspect ratio.
    pub value: f64,
}

/// An open-to-closed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlinkEvent {
    /// Frame at which closure was detected.
    pub frame_index: u64,
    /// Presentation offset of that frame, in milliseconds.
    pub offset_ms: u64,
}

/// Per-request blink detector.
#[derive(Debug, Clone)]
pub struct EyeStateTracker {
    open_threshold: f64,
    closed_threshold: f64,
    eye: EyeSelection,
    min_face_confidence: f32,
    previous_ear: Option<f64>,
    blinks: Vec<BlinkEvent>,
    frames_with_face: u64,
}

impl EyeStateTracker {
    /// Creates a tracker from the liveness configuration.
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            open_threshold: config.open_threshold,
            closed_threshold: config.closed_threshold,
            eye: config.eye,
            min_face_confidence: config.min_face_confidence,
            previous_ear: None,
            blinks: Vec::new(),
            frames_with_face: 0,
        }
    }

    /// Creates a tracker with explicit hysteresis thresholds.
    pub fn with_thresholds(open_threshold: f64, closed_threshold: f64) -> Self {
        Self::new(&LivenessConfig {
            open_threshold,
            closed_threshold,
            ..LivenessConfig::default()
        })
    }

    /// Feeds one frame's landmark result.
    ///
    /// Returns the blink detected on this frame, if any.
    pub fn observe(&mut self, frame: &Frame, landmarks: Option<&LandmarkSet>) -> Option<BlinkEvent> {
        let landmarks = landmarks?;
        if !landmarks.confidence.is_finite() || landmarks.confidence < self.min_face_confidence {
            tracing::trace!(
                sequence = frame.sequence(),
                confidence = landmarks.confidence,
                "landmarks below confidence floor"
            );
            return None;
        }

        let value = self.eye.ear(landmarks);
        if !value.is_finite() {
            tracing::debug!(sequence = frame.sequence(), "non-finite EAR ignored");
            return None;
        }

        self.frames_with_face += 1;
        self.observe_ear(
            EarSample {
                frame_index: frame.sequence(),
                value,
            },
            frame.offset(),
        )
    }

    /// Feeds one EAR sample directly.
    pub fn observe_ear(&mut self, sample: EarSample, offset: Duration) -> Option<BlinkEvent> {
        let blink = match self.previous_ear {
            Some(prev) if prev > self.open_threshold && sample.value < self.closed_threshold => {
                Some(BlinkEvent {
                    frame_index: sample.frame_index,
                    offset_ms: u64::try_from(offset.as_millis()).unwrap_or(u64::MAX),
                })
            }
            _ => None,
        };

        tracing::trace!(
            frame = sample.frame_index,
            ear = sample.value,
            previous = ?self.previous_ear,
            "EAR sample"
        );

        if let Some(event) = blink {
            tracing::debug!(frame = event.frame_index, total = self.blinks.len() + 1, "blink detected");
            self.blinks.push(event);
        }
        self.previous_ear = Some(sample.value);

        blink
    }

    /// Blinks counted so far.
    pub fn blink_count(&self) -> usize {
        self.blinks.len()
    }

    /// Blink events in detection order.
    pub fn blinks(&self) -> &[BlinkEvent] {
        &self.blinks
    }

    /// Most recent EAR sample, if any frame had landmarks.
    pub fn previous_ear(&self) -> Option<f64> {
        self.previous_ear
    }

    /// Frames that contributed an EAR sample.
    pub fn frames_with_face(&self) -> u64 {
        self.frames_with_face
    }

    /// Consumes the tracker, keeping the blink events.
    pub fn into_blinks(self) -> Vec<BlinkEvent> {
        self.blinks
    }
}

impl Default for EyeStateTracker {
    fn default() -> Self {
        Self::new(&LivenessConfig::default())
    }
}
