//! Liveness fusion.
//!
//! Combines the blink count and mean motion of one request into a verdict.
//! Either signal alone is enough: a held-up photo shows neither blinks nor
//! motion, while a replayed recording usually carries at least ambient
//! motion. The confidence formula is an additive, saturating heuristic and
//! is not calibrated against labelled data.

use serde::{Deserialize, Serialize};

use crate::config::LivenessConfig;

/// Terminal liveness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    /// Blink or motion evidence was found.
    pub is_live: bool,
    /// Always within [0, 1].
    pub confidence: f64,
}

impl LivenessResult {
    /// Verdict for a request that showed no evidence of life.
    pub const NOT_LIVE: Self = Self {
        is_live: false,
        confidence: 0.0,
    };
}

/// Clamps a confidence value into [0, 1], mapping NaN to 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fuses blink and motion evidence.
#[derive(Debug, Clone)]
pub struct LivenessFusion {
    motion_threshold: f64,
    blink_weight: f64,
}

impl LivenessFusion {
    /// Takes the fusion constants from `config`.
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            motion_threshold: config.motion_threshold,
            blink_weight: config.blink_weight,
        }
    }

    /// Applies the decision rule.
    ///
    /// `is_live = blinks >= 1 || mean_motion > motion_threshold`
    /// `confidence = min(1, blinks * blink_weight + mean_motion)`
    pub fn fuse(&self, blink_count: usize, mean_motion: f64) -> LivenessResult {
        let mean_motion = clamp_confidence(mean_motion);
        let is_live = blink_count >= 1 || mean_motion > self.motion_threshold;
        let confidence = clamp_confidence(blink_count as f64 * self.blink_weight + mean_motion);

        tracing::trace!(blink_count, mean_motion, is_live, confidence, "liveness fused");

        LivenessResult {
            is_live,
            confidence,
        }
    }
}

impl Default for LivenessFusion {
    fn default() -> Self {
        Self::new(&LivenessConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_evidence_is_not_live() {
        let result = LivenessFusion::default().fuse(0, 0.0);
        assert_eq!(result, LivenessResult::NOT_LIVE);
    }

    #[test]
    fn test_single_blink_is_live() {
        let result = LivenessFusion::default().fuse(1, 0.0);
        assert!(result.is_live);
        assert!((result.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_motion_alone_is_live() {
        let result = LivenessFusion::default().fuse(0, 0.03);
        assert!(result.is_live);
        assert!((result.confidence - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_motion_at_threshold_is_not_live() {
        let result = LivenessFusion::default().fuse(0, 0.02);
        assert!(!result.is_live);
    }

    #[test]
    fn test_confidence_saturates() {
        let result = LivenessFusion::default().fuse(5, 0.4);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_nan_motion_is_harmless() {
        let result = LivenessFusion::default().fuse(0, f64::NAN);
        assert_eq!(result, LivenessResult::NOT_LIVE);
    }

    #[test]
    fn test_custom_weight() {
        let fusion = LivenessFusion::new(&LivenessConfig {
            blink_weight: 0.2,
            ..LivenessConfig::default()
        });
        let result = fusion.fuse(2, 0.1);
        assert!((result.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(LivenessResult {
            is_live: true,
            confidence: 0.75,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"is_live": true, "confidence": 0.75}));
    }
}
