//! Inter-frame motion scoring via frame differencing.
//!
//! A photo held in front of the camera produces near-identical
//! consecutive frames. Each frame after the first is compared with its
//! predecessor and the summed absolute difference is normalized by
//! `width * height * 255`, giving a resolution-independent score.

use crate::media::Frame;

/// Normalized difference between one frame and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Frame the score belongs to.
    pub frame_index: u64,
    /// Score in [0, 1].
    pub value: f64,
}

/// Mean absolute difference of two equally shaped frames.
///
/// All channel differences are summed and divided by
/// `width * height * 255`. Multi-channel frames can exceed 1.0 under that
/// normalization, so the result is clamped.
pub fn frame_difference(current: &Frame, previous: &Frame) -> f64 {
    let total: u64 = current
        .pixels()
        .iter()
        .zip(previous.pixels().iter())
        .map(|(&c, &p)| u64::from(c.abs_diff(p)))
        .sum();

    let norm = current.pixel_count() as f64 * 255.0;
    if norm == 0.0 {
        return 0.0;
    }
    (total as f64 / norm).clamp(0.0, 1.0)
}

/// Accumulates motion over one request.
///
/// Only the running sum and count are kept; individual samples are
/// returned to the caller and not retained.
#[derive(Debug, Default)]
pub struct MotionScorer {
    /// Previous frame for differencing.
    previous: Option<Frame>,
    sum_score: f64,
    frame_count: u64,
}

impl MotionScorer {
    /// Scorer with no previous frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of the next frame and scores it against the last.
    ///
    /// Returns `None` on the first frame, and on a frame whose geometry
    /// differs from its predecessor; that frame becomes the new baseline.
    pub fn observe(&mut self, current: Frame) -> Option<MotionSample> {
        let sample = match self.previous.as_ref() {
            Some(prev) if prev.same_geometry(&current) => Some(MotionSample {
                frame_index: current.sequence(),
                value: frame_difference(&current, prev),
            }),
            Some(prev) => {
                tracing::warn!(
                    sequence = current.sequence(),
                    previous = ?(prev.width(), prev.height(), prev.channels()),
                    current = ?(current.width(), current.height(), current.channels()),
                    "frame geometry changed, motion baseline reset"
                );
                None
            }
            None => None,
        };

        if let Some(s) = sample {
            self.sum_score += s.value;
            self.frame_count += 1;
            tracing::trace!(frame = s.frame_index, motion = s.value, "motion sample");
        }

        // Store current as previous for next call
        self.previous = Some(current);

        sample
    }

    /// Mean motion over all compared frame pairs, 0.0 if none.
    pub fn mean_motion(&self) -> f64 {
        self.sum_score / self.frame_count.max(1) as f64
    }

    /// Number of frame pairs compared.
    pub fn compared_frames(&self) -> u64 {
        self.frame_count
    }

    /// Returns true once a baseline frame is held.
    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }
}
