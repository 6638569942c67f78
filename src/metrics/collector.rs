//! Metrics collection and registry.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::engine::LivenessAnalysis;
use crate::error::ErrorKind;
use crate::verification::VerificationResult;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric registration failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for request outcomes.
///
/// All methods take `&self`; the registry can be shared behind an `Arc`
/// between the engine, the verifier and the exposition server.
pub struct MetricsRegistry {
    registry: Registry,

    // Liveness metrics
    liveness_analyses: IntCounter,
    liveness_live: IntCounter,
    frames_processed: IntCounter,
    degraded_frames: IntCounter,
    blinks_detected: IntCounter,
    last_confidence: Gauge,

    // Verification metrics
    verification_requests: IntCounter,
    verification_matches: IntCounter,

    failures: IntCounterVec,
}

impl MetricsRegistry {
    /// Creates a new registry with all metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let liveness_analyses = IntCounter::new(
            "antifraud_liveness_analyses_total",
            "Liveness analyses that produced a verdict",
        )?;
        let liveness_live = IntCounter::new(
            "antifraud_liveness_live_total",
            "Liveness verdicts with is_live=true",
        )?;
        let frames_processed = IntCounter::new(
            "antifraud_liveness_frames_processed_total",
            "Frames consumed by completed liveness analyses",
        )?;
        let degraded_frames = IntCounter::new(
            "antifraud_liveness_degraded_frames_total",
            "Frames whose landmark call failed or timed out",
        )?;
        let blinks_detected = IntCounter::new(
            "antifraud_liveness_blinks_total",
            "Blink events detected",
        )?;
        let last_confidence = Gauge::new(
            "antifraud_liveness_last_confidence",
            "Confidence of the most recent liveness verdict",
        )?;

        let verification_requests = IntCounter::new(
            "antifraud_verification_requests_total",
            "Identity verifications that produced a result",
        )?;
        let verification_matches = IntCounter::new(
            "antifraud_verification_matches_total",
            "Identity verifications with is_match=true",
        )?;

        let failures = IntCounterVec::new(
            Opts::new("antifraud_request_failures_total", "Failed requests by error kind"),
            &["kind"],
        )?;
        for kind in ErrorKind::ALL {
            failures.with_label_values(&[kind.as_str()]);
        }

        registry.register(Box::new(liveness_analyses.clone()))?;
        registry.register(Box::new(liveness_live.clone()))?;
        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(degraded_frames.clone()))?;
        registry.register(Box::new(blinks_detected.clone()))?;
        registry.register(Box::new(last_confidence.clone()))?;
        registry.register(Box::new(verification_requests.clone()))?;
        registry.register(Box::new(verification_matches.clone()))?;
        registry.register(Box::new(failures.clone()))?;

        Ok(Self {
            registry,
            liveness_analyses,
            liveness_live,
            frames_processed,
            degraded_frames,
            blinks_detected,
            last_confidence,
            verification_requests,
            verification_matches,
            failures,
        })
    }

    /// Records a completed liveness analysis.
    pub fn record_liveness(&self, analysis: &LivenessAnalysis) {
        self.liveness_analyses.inc();
        if analysis.result.is_live {
            self.liveness_live.inc();
        }
        self.frames_processed.inc_by(analysis.frames_processed);
        self.degraded_frames.inc_by(analysis.flags.degraded_frames);
        self.blinks_detected.inc_by(analysis.blink_events.len() as u64);
        self.last_confidence.set(analysis.result.confidence);
    }

    /// Records a completed identity verification.
    pub fn record_verification(&self, result: &VerificationResult) {
        self.verification_requests.inc();
        if result.is_match {
            self.verification_matches.inc();
        }
    }

    /// Records a failed request.
    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures.with_label_values(&[kind.as_str()]).inc();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("liveness_analyses", &self.liveness_analyses.get())
            .field("verification_requests", &self.verification_requests.get())
            .finish_non_exhaustive()
    }
}
