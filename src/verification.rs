//! Identity verification.
//!
//! An external face-analysis capability scores a set of attributes for the
//! primary face (for example an emotion classifier's class probabilities).
//! The best attribute probability serves as a proxy for "a clear,
//! analysable face is present". This is a quality signal, not a comparison
//! against a reference identity.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bounded::TimeLimited;
use crate::config::VerificationConfig;
use crate::error::AnalysisError;
use crate::fusion::clamp_confidence;
use crate::landmarks::CapabilityError;
use crate::media::{fingerprint, Frame, FrameSource, MediaError, MediaKind};
use crate::metrics::MetricsRegistry;

/// Attribute label to probability, as reported by a face analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeScores(BTreeMap<String, f64>);

impl AttributeScores {
    /// Empty score set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probability for `label`, replacing any earlier value.
    pub fn insert(&mut self, label: impl Into<String>, probability: f64) {
        self.0.insert(label.into(), probability);
    }

    /// Probability reported for `label`.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(label).copied()
    }

    /// Number of scored labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no label was scored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest finite probability and its label.
    ///
    /// Ties go to the label that sorts first.
    pub fn best(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, &p) in &self.0 {
            if p.is_finite() && best.map_or(true, |(_, top)| p > top) {
                best = Some((label.as_str(), p));
            }
        }
        best
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for AttributeScores {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Scores attributes of the primary face in a frame.
///
/// `Ok(None)` means no face was found.
pub trait FaceAnalyzer: Send + Sync {
    /// Scores the primary face in `frame`.
    fn analyze(&self, frame: &Frame) -> Result<Option<AttributeScores>, CapabilityError>;
}

impl<A: FaceAnalyzer + ?Sized> FaceAnalyzer for &A {
    fn analyze(&self, frame: &Frame) -> Result<Option<AttributeScores>, CapabilityError> {
        (**self).analyze(frame)
    }
}

impl<A: FaceAnalyzer + ?Sized> FaceAnalyzer for Arc<A> {
    fn analyze(&self, frame: &Frame) -> Result<Option<AttributeScores>, CapabilityError> {
        (**self).analyze(frame)
    }
}

impl TimeLimited<Option<AttributeScores>> {
    /// Moves `analyzer` onto a worker thread with a per-frame budget.
    pub fn analyzer<A>(analyzer: A, timeout: Duration) -> Result<Self, CapabilityError>
    where
        A: FaceAnalyzer + 'static,
    {
        TimeLimited::spawn("face-analysis-worker", timeout, move |frame: &Frame| analyzer.analyze(frame))
    }
}

impl FaceAnalyzer for TimeLimited<Option<AttributeScores>> {
    fn analyze(&self, frame: &Frame) -> Result<Option<AttributeScores>, CapabilityError> {
        self.call(frame)
    }
}

/// Replays a fixed analyzer answer, loaded from JSON.
///
/// The file holds either an object of label to probability or `null`
/// for "no face".
#[derive(Debug, Clone, Default)]
pub struct RecordedScores {
    scores: Option<AttributeScores>,
}

impl RecordedScores {
    /// Always answers with `scores`.
    pub fn new(scores: Option<AttributeScores>) -> Self {
        Self { scores }
    }

    /// Parses an object of label to probability, or `null`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Loads a recording; an unreadable file makes the capability unavailable.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CapabilityError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CapabilityError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text).map_err(|e| {
            CapabilityError::Unavailable(format!("invalid scores {}: {e}", path.display()))
        })
    }
}

impl FaceAnalyzer for RecordedScores {
    fn analyze(&self, _frame: &Frame) -> Result<Option<AttributeScores>, CapabilityError> {
        Ok(self.scores.clone())
    }
}

/// Terminal verification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// A clear, analysable face was found.
    pub is_match: bool,
    /// Always within [0, 1].
    pub confidence: f64,
}

impl VerificationResult {
    /// Verdict when no face could be analysed.
    pub const NO_MATCH: Self = Self {
        is_match: false,
        confidence: 0.0,
    };
}

/// A verification verdict with the attribute that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// The verdict.
    pub result: VerificationResult,
    /// Label whose score set the confidence.
    pub best_attribute: Option<String>,
    /// The analyzer found a face and returned scores.
    pub face_analyzed: bool,
    /// BLAKE3 digest of the input bytes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_digest: Option<String>,
}

impl VerificationOutcome {
    fn no_face() -> Self {
        Self {
            result: VerificationResult::NO_MATCH,
            best_attribute: None,
            face_analyzed: false,
            media_digest: None,
        }
    }
}

/// Maps a probability reported either as a fraction or a percentage to [0, 1].
pub fn normalize_probability(value: f64) -> f64 {
    if value > 1.0 {
        clamp_confidence(value / 100.0)
    } else {
        clamp_confidence(value)
    }
}

/// Runs the face analyzer on a key frame and thresholds its best score.
pub struct IdentityVerifier<A> {
    config: VerificationConfig,
    analyzer: A,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<A: FaceAnalyzer> IdentityVerifier<A> {
    /// Creates a verifier without metrics.
    pub fn new(config: VerificationConfig, analyzer: A) -> Self {
        Self {
            config,
            analyzer,
            metrics: None,
        }
    }

    /// Records verdicts and failures in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Verifies an upload. Videos are judged on their first frame.
    pub fn verify(&self, media: &[u8], kind: MediaKind) -> Result<VerificationOutcome, AnalysisError> {
        let digest = fingerprint(media);
        let span = tracing::info_span!("verify", digest = %&digest[..12], kind = %kind);
        let _enter = span.enter();

        let outcome = self.key_frame(media, kind).and_then(|frame| {
            let mut outcome = self.verify_frame(&frame)?;
            outcome.media_digest = Some(digest);
            Ok(outcome)
        });

        match &outcome {
            Ok(o) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_verification(&o.result);
                }
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "verification failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(e.kind());
                }
            }
        }
        outcome
    }

    /// Verifies a single decoded frame.
    pub fn verify_frame(&self, frame: &Frame) -> Result<VerificationOutcome, AnalysisError> {
        let scores = match self.analyzer.analyze(frame) {
            Ok(Some(scores)) => scores,
            Ok(None) => {
                tracing::debug!(sequence = frame.sequence(), "no face to verify");
                return Ok(VerificationOutcome::no_face());
            }
            Err(e) if e.is_systemic() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(sequence = frame.sequence(), error = %e, "face analysis failed");
                return Ok(VerificationOutcome::no_face());
            }
        };

        let Some((label, best)) = scores.best() else {
            tracing::debug!("analyzer returned no usable scores");
            return Ok(VerificationOutcome {
                face_analyzed: true,
                ..VerificationOutcome::no_face()
            });
        };

        let confidence = normalize_probability(best);
        let result = VerificationResult {
            is_match: confidence > self.config.match_threshold,
            confidence,
        };
        tracing::info!(
            is_match = result.is_match,
            confidence,
            attribute = label,
            "identity verified"
        );

        Ok(VerificationOutcome {
            result,
            best_attribute: Some(label.to_string()),
            face_analyzed: true,
            media_digest: None,
        })
    }

    fn key_frame(&self, media: &[u8], kind: MediaKind) -> Result<Frame, AnalysisError> {
        let mut source = FrameSource::decode(media, kind)?;
        match source.next() {
            Some(frame) => Ok(frame?),
            None => Err(MediaError::Empty.into()),
        }
    }
}

impl<A> std::fmt::Debug for IdentityVerifier<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
