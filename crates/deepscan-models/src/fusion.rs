//! Weighted fusion of the RGB and optical-flow classifiers.

use serde::{Deserialize, Serialize};

use crate::prediction::Prediction;

/// How much the RGB model contributes to the fused probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FusionWeighting {
    /// Fixed RGB weight in `[0, 1]`; the optical-flow model gets `1 - weight`.
    Fixed { rgb_weight: f64 },
    /// Weight derived from how far each model is from 0.5.
    Adaptive,
}

impl Default for FusionWeighting {
    fn default() -> Self {
        Self::Fixed { rgb_weight: 0.7 }
    }
}

/// Outcome of fusing both model averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionOutcome {
    pub prediction: Prediction,
    /// Fused probability of "fake"
    pub probability: f64,
    pub rgb_weight: f64,
    pub optical_weight: f64,
}

/// Distance of a probability from 0.5, scaled to `[0, 1]`.
pub fn model_confidence(probability: f64) -> f64 {
    (probability - 0.5).abs() * 2.0
}

/// Fuse the mean RGB and optical-flow probabilities.
///
/// The video is `Real` when the fused probability is below `threshold`.
pub fn fuse(rgb_probability: f64, optical_probability: f64, weighting: FusionWeighting, threshold: f64) -> FusionOutcome {
    let rgb_weight = match weighting {
        FusionWeighting::Fixed { rgb_weight } => rgb_weight,
        FusionWeighting::Adaptive => {
            let rgb_conf = model_confidence(rgb_probability);
            let optical_conf = model_confidence(optical_probability);
            let disagree = (rgb_probability > 0.5) != (optical_probability > 0.5);

            // Both confident but opposed: trust RGB.
            if rgb_conf > 0.5 && optical_conf > 0.5 && disagree {
                0.8
            } else {
                let total = rgb_conf + optical_conf;
                if total > 0.0 {
                    rgb_conf / total
                } else {
                    0.5
                }
            }
        }
    };
    let optical_weight = 1.0 - rgb_weight;
    let probability = rgb_probability * rgb_weight + optical_probability * optical_weight;

    let prediction = if probability < threshold {
        Prediction::Real
    } else {
        Prediction::Fake
    };

    FusionOutcome {
        prediction,
        probability,
        rgb_weight,
        optical_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_weights() {
        let outcome = fuse(0.9, 0.3, FusionWeighting::default(), 0.5);
        // 0.9 * 0.7 + 0.3 * 0.3
        assert!((outcome.probability - 0.72).abs() < 1e-9);
        assert_eq!(outcome.prediction, Prediction::Fake);
        assert!((outcome.optical_weight - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_weight_used_as_given() {
        let outcome = fuse(0.9, 0.1, FusionWeighting::Fixed { rgb_weight: 1.0 }, 0.5);
        assert_eq!(outcome.probability, 0.9);
        assert_eq!(outcome.optical_weight, 0.0);

        let outcome = fuse(0.9, 0.1, FusionWeighting::Fixed { rgb_weight: 0.25 }, 0.5);
        assert!((outcome.probability - 0.3).abs() < 1e-9);
        assert_eq!(outcome.prediction, Prediction::Real);
    }

    #[test]
    fn test_threshold_is_exclusive_for_real() {
        let outcome = fuse(0.5, 0.5, FusionWeighting::default(), 0.5);
        assert_eq!(outcome.prediction, Prediction::Fake);

        let outcome = fuse(0.4, 0.4, FusionWeighting::default(), 0.5);
        assert_eq!(outcome.prediction, Prediction::Real);
    }

    #[test]
    fn test_adaptive_confident_disagreement_prefers_rgb() {
        let outcome = fuse(0.95, 0.1, FusionWeighting::Adaptive, 0.5);
        assert!((outcome.rgb_weight - 0.8).abs() < 1e-9);
        // 0.95 * 0.8 + 0.1 * 0.2
        assert!((outcome.probability - 0.78).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_relative_confidence() {
        // rgb_conf = 0.4, optical_conf = 0.2
        let outcome = fuse(0.7, 0.6, FusionWeighting::Adaptive, 0.5);
        assert!((outcome.rgb_weight - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_both_uncertain() {
        let outcome = fuse(0.5, 0.5, FusionWeighting::Adaptive, 0.5);
        assert!((outcome.rgb_weight - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_model_confidence() {
        assert!((model_confidence(1.0) - 1.0).abs() < 1e-9);
        assert!((model_confidence(0.25) - 0.5).abs() < 1e-9);
        assert_eq!(model_confidence(0.5), 0.0);
    }
}
