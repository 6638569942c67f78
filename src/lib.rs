//! Antifraud Liveness Library
//!
//! Decides whether an uploaded video or still image shows a live, moving
//! human face, and whether the face in it is clear enough to analyse.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! media → landmarks → tracking (eye state, motion) → fusion
//!   ↓
//! verification (independent path)
//! ```
//!
//! Landmark extraction and face analysis are external capabilities behind
//! the [`LandmarkExtractor`] and [`FaceAnalyzer`] traits.
//!
//! # Design Principles
//!
//! - **Per-request state**: the engine is immutable; every request owns a
//!   [`LivenessSession`] that is discarded when the verdict is produced
//! - **Degrade per frame, fail per request**: a face capability failing on
//!   one frame only removes that frame's landmarks
//! - **No partial verdicts**: a request that hits its deadline fails
//! - **Heuristic, not calibrated**: decision constants are configuration
//!
//! # Example
//!
//! ```no_run
//! use antifraud_liveness::{Deadline, LivenessConfig, LivenessEngine, MediaKind, NoFaceExtractor};
//!
//! let bytes = std::fs::read("clip.gif").unwrap();
//! let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
//!
//! let analysis = engine
//!     .analyze(&bytes, MediaKind::Video, &Deadline::none())
//!     .unwrap();
//!
//! println!("live: {} ({:.2})", analysis.result.is_live, analysis.result.confidence);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod bounded;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod landmarks;
pub mod media;
pub mod metrics;
pub mod tracking;
pub mod verification;

// Re-export commonly used types at crate root
pub use config::{AppConfig, ConfigError, LimitsConfig, LivenessConfig, VerificationConfig};
pub use engine::{Deadline, LivenessAnalysis, LivenessEngine, LivenessFlags, LivenessSession};
pub use error::{AnalysisError, ErrorKind};
pub use fusion::{LivenessFusion, LivenessResult};
pub use bounded::TimeLimited;
pub use landmarks::{
    CapabilityError, LandmarkExtractor, LandmarkSet, NoFaceExtractor, RecordedLandmarks,
};
pub use media::{Frame, FrameSource, MediaError, MediaKind};
pub use tracking::{EyeStateTracker, MotionScorer};
pub use verification::{
    AttributeScores, FaceAnalyzer, IdentityVerifier, RecordedScores, VerificationOutcome,
    VerificationResult,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
