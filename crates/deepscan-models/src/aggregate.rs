//! Majority-vote aggregation of per-sample scores.

use serde::{Deserialize, Serialize};

use crate::prediction::{FrameVerdict, Prediction};

/// A frame is analysed when its index is a multiple of this stride.
pub const SAMPLE_EVERY_N_FRAMES: u64 = 5;

/// Whether the zero-based frame `index` falls on the sampling stride.
///
/// A stride of 0 is treated as 1 (every frame).
#[inline]
pub fn is_sampled_frame(index: u64, stride: u64) -> bool {
    index % stride.max(1) == 0
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Aggregated verdict for a whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub prediction: Prediction,
    /// Mean per-sample confidence, rounded to 4 places.
    pub confidence: f64,
    pub confidence_scores: Vec<f64>,
    pub real_samples: usize,
    pub fake_samples: usize,
}

impl Aggregate {
    /// Total number of classified samples.
    pub fn samples(&self) -> usize {
        self.real_samples + self.fake_samples
    }
}

/// Accumulates per-sample verdicts in the order they are classified.
#[derive(Debug, Clone, Default)]
pub struct ScoreAggregator {
    real: usize,
    fake: usize,
    total_confidence: f64,
    scores: Vec<f64>,
}

impl ScoreAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw model score and return the flipped verdict.
    pub fn push_score(&mut self, score: f64) -> FrameVerdict {
        let verdict = FrameVerdict::from_score(score);
        self.push(verdict);
        verdict
    }

    /// Record an already-flipped verdict.
    pub fn push(&mut self, verdict: FrameVerdict) {
        match verdict.prediction {
            Prediction::Real => self.real += 1,
            Prediction::Fake => self.fake += 1,
        }
        self.total_confidence += verdict.confidence;
        self.scores.push(verdict.confidence);
    }

    /// Number of samples recorded so far.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Produce the final verdict. Ties go to `Real`.
    pub fn finish(self) -> Aggregate {
        let total = self.real + self.fake;
        let confidence = if total > 0 {
            round_to(self.total_confidence / total as f64, 4)
        } else {
            0.0
        };
        let prediction = if self.real >= self.fake {
            Prediction::Real
        } else {
            Prediction::Fake
        };

        Aggregate {
            prediction,
            confidence,
            confidence_scores: self.scores,
            real_samples: self.real,
            fake_samples: self.fake,
        }
    }
}
