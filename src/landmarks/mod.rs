//! Facial landmark adapter.
//!
//! The landmark model itself is an external capability. This module
//! defines the geometry the eye-state tracker needs ([`LandmarkSet`]) and
//! the [`LandmarkExtractor`] seam any concrete backend plugs into.

mod recorded;
mod set;

pub use recorded::{NoFaceExtractor, RecordedLandmarks};
pub use set::{EyeContour, LandmarkSet, MeshLayout, Point};

use std::time::Duration;

use crate::bounded::TimeLimited;
use crate::media::Frame;
use thiserror::Error;

/// Failures reported by an external face capability.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The backend is down or cannot be reached. Fatal for the request.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    /// The backend failed on this frame only.
    #[error("capability failed on frame {sequence}: {reason}")]
    Frame {
        /// Frame the backend failed on.
        sequence: u64,
        /// Backend's explanation.
        reason: String,
    },
    /// The backend did not answer within the per-frame budget.
    #[error("capability timed out on frame {sequence}")]
    Timeout {
        /// Frame whose call overran.
        sequence: u64,
    },
}

impl CapabilityError {
    /// True when the failure affects every frame, not just this one.
    pub fn is_systemic(&self) -> bool {
        matches!(self, CapabilityError::Unavailable(_))
    }
}

/// Locates one primary face and its eye contours in a frame.
///
/// Implementations must be deterministic for identical pixels. Returning
/// `Ok(None)` means "no face in this frame", which is a normal outcome.
pub trait LandmarkExtractor: Send + Sync {
    /// Extracts landmarks for the primary face in `frame`.
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError>;
}

impl<E: LandmarkExtractor + ?Sized> LandmarkExtractor for &E {
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        (**self).extract(frame)
    }
}

impl<E: LandmarkExtractor + ?Sized> LandmarkExtractor for Box<E> {
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        (**self).extract(frame)
    }
}

impl<E: LandmarkExtractor + ?Sized> LandmarkExtractor for std::sync::Arc<E> {
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        (**self).extract(frame)
    }
}

impl TimeLimited<Option<LandmarkSet>> {
    /// Moves `extractor` onto a worker thread with a per-frame budget.
    pub fn extractor<E>(extractor: E, timeout: Duration) -> Result<Self, CapabilityError>
    where
        E: LandmarkExtractor + 'static,
    {
        TimeLimited::spawn("landmark-worker", timeout, move |frame: &Frame| extractor.extract(frame))
    }
}

impl LandmarkExtractor for TimeLimited<Option<LandmarkSet>> {
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        self.call(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_systemic() {
        assert!(CapabilityError::Unavailable("down".into()).is_systemic());
        assert!(!CapabilityError::Timeout { sequence: 3 }.is_systemic());
        assert!(!CapabilityError::Frame {
            sequence: 3,
            reason: "bad crop".into()
        }
        .is_systemic());
    }
}
