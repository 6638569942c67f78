//! Prometheus metrics for liveness and verification requests.
//!
//! # Metrics Exposed
//!
//! ## Liveness
//! - `antifraud_liveness_analyses_total` - Analyses that produced a verdict
//! - `antifraud_liveness_live_total` - Verdicts with `is_live = true`
//! - `antifraud_liveness_frames_processed_total` - Frames consumed
//! - `antifraud_liveness_degraded_frames_total` - Frames whose landmark call failed
//! - `antifraud_liveness_blinks_total` - Blink events detected
//! - `antifraud_liveness_last_confidence` - Confidence of the latest verdict
//!
//! ## Verification
//! - `antifraud_verification_requests_total` - Verifications that produced a result
//! - `antifraud_verification_matches_total` - Results with `is_match = true`
//!
//! ## Failures
//! - `antifraud_request_failures_total{kind}` - Failed requests by error kind
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use antifraud_liveness::metrics::MetricsRegistry;
//! use antifraud_liveness::{LivenessConfig, LivenessEngine, NoFaceExtractor};
//!
//! let registry = Arc::new(MetricsRegistry::new().expect("Failed to create registry"));
//! let _engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor)
//!     .with_metrics(Arc::clone(&registry));
//!
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
