//! Extractors that need no model.

use std::path::Path;

use super::{CapabilityError, LandmarkExtractor, LandmarkSet};
use crate::media::Frame;

/// Extractor that never finds a face.
///
/// Liveness then rests on motion alone, which is the behaviour when no
/// landmark backend is deployed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceExtractor;

impl LandmarkExtractor for NoFaceExtractor {
    fn extract(&self, _frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        Ok(None)
    }
}

/// Replays landmarks recorded per frame index.
///
/// The recording is a JSON array indexed by frame sequence number; `null`
/// entries mean no face was found in that frame. Frames past the end of the
/// recording have no face.
#[derive(Debug, Clone, Default)]
pub struct RecordedLandmarks {
    frames: Vec<Option<LandmarkSet>>,
}

impl RecordedLandmarks {
    /// Replays `frames` in order; frames past the end have no face.
    pub fn new(frames: Vec<Option<LandmarkSet>>) -> Self {
        Self { frames }
    }

    /// Parses a recording from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Loads a recording from a JSON sidecar file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CapabilityError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CapabilityError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let recording = Self::from_json(&text).map_err(|e| {
            CapabilityError::Unavailable(format!("invalid recording {}: {e}", path.display()))
        })?;

        tracing::debug!(
            path = %path.display(),
            frames = recording.len(),
            "landmark recording loaded"
        );
        Ok(recording)
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkExtractor for RecordedLandmarks {
    fn extract(&self, frame: &Frame) -> Result<Option<LandmarkSet>, CapabilityError> {
        let found = usize::try_from(frame.sequence())
            .ok()
            .and_then(|i| self.frames.get(i))
            .copied()
            .flatten();
        Ok(found)
    }
}
