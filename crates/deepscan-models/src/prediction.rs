//! Real/Fake prediction labels and the per-sample label flip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score at or above which a sample is classified as fake.
pub const FAKE_THRESHOLD: f64 = 0.5;

/// Final or per-sample classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prediction {
    Real,
    Fake,
}

impl Prediction {
    /// Label as printed in result JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Real => "Real",
            Prediction::Fake => "Fake",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single sampled face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameVerdict {
    pub prediction: Prediction,
    /// Confidence in `prediction`, always in `[0.5, 1.0]` for valid scores.
    pub confidence: f64,
}

impl FrameVerdict {
    /// Build a verdict from the raw model output (probability of "fake").
    ///
    /// Scores below the threshold are flipped so that the confidence always
    /// refers to the predicted class.
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        if score >= FAKE_THRESHOLD {
            Self {
                prediction: Prediction::Fake,
                confidence: score,
            }
        } else {
            Self {
                prediction: Prediction::Real,
                confidence: 1.0 - score,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Prediction::Real).unwrap(), "\"Real\"");
        assert_eq!(serde_json::to_string(&Prediction::Fake).unwrap(), "\"Fake\"");
        assert_eq!(Prediction::Fake.to_string(), "Fake");
    }

    #[test]
    fn test_high_score_is_fake() {
        let verdict = FrameVerdict::from_score(0.8);
        assert_eq!(verdict.prediction, Prediction::Fake);
        assert!((verdict.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_low_score_is_flipped() {
        let verdict = FrameVerdict::from_score(0.2);
        assert_eq!(verdict.prediction, Prediction::Real);
        assert!((verdict.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_counts_as_fake() {
        let verdict = FrameVerdict::from_score(0.5);
        assert_eq!(verdict.prediction, Prediction::Fake);
        assert!((verdict.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        assert!((FrameVerdict::from_score(1.7).confidence - 1.0).abs() < 1e-9);
        let verdict = FrameVerdict::from_score(-0.3);
        assert_eq!(verdict.prediction, Prediction::Real);
        assert!((verdict.confidence - 1.0).abs() < 1e-9);
    }
}
