//! Request-level failures.
//!
//! Every fatal outcome of a liveness or verification request maps onto one
//! of four [`ErrorKind`]s. "No face in this frame" is deliberately absent:
//! it is a normal per-frame outcome, never a request failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::CapabilityError;
use crate::media::MediaError;

/// Errors that abort a request. None of them is retried by the engine.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Decoding failed or produced nothing.
    #[error(transparent)]
    Media(#[from] MediaError),
    /// A face capability failed for every frame.
    #[error("face capability unavailable: {0}")]
    CapabilityUnavailable(String),
    /// The deadline or abort flag stopped the request.
    #[error("request aborted after {frames} frames: deadline reached")]
    MediaTimeout {
        /// Frames processed before the abort.
        frames: u64,
    },
}

impl AnalysisError {
    /// Stable classification for callers and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Media(MediaError::Decode { .. }) => ErrorKind::DecodeError,
            AnalysisError::Media(MediaError::Empty) => ErrorKind::EmptyMedia,
            AnalysisError::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            AnalysisError::MediaTimeout { .. } => ErrorKind::MediaTimeout,
        }
    }
}

impl From<CapabilityError> for AnalysisError {
    fn from(e: CapabilityError) -> Self {
        AnalysisError::CapabilityUnavailable(e.to_string())
    }
}

/// The fixed set of failure kinds a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Media could not be parsed as the declared kind.
    DecodeError,
    /// Decoding produced zero frames.
    EmptyMedia,
    /// The external face capability is down.
    CapabilityUnavailable,
    /// The caller's deadline expired before all frames were read.
    MediaTimeout,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::DecodeError,
        ErrorKind::EmptyMedia,
        ErrorKind::CapabilityUnavailable,
        ErrorKind::MediaTimeout,
    ];

    /// Stable snake_case name used in reports and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::EmptyMedia => "empty_media",
            ErrorKind::CapabilityUnavailable => "capability_unavailable",
            ErrorKind::MediaTimeout => "media_timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[test]
    fn test_kinds() {
        let decode = AnalysisError::from(MediaError::Decode {
            kind: MediaKind::Video,
            reason: "truncated".into(),
        });
        assert_eq!(decode.kind(), ErrorKind::DecodeError);
        assert_eq!(AnalysisError::from(MediaError::Empty).kind(), ErrorKind::EmptyMedia);
        assert_eq!(
            AnalysisError::from(CapabilityError::Unavailable("down".into())).kind(),
            ErrorKind::CapabilityUnavailable
        );
        assert_eq!(
            AnalysisError::MediaTimeout { frames: 3 }.kind(),
            ErrorKind::MediaTimeout
        );
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }
}
