//! Inference result types
//!
//! An [`InferenceResult`] is one detection sample: a percentage per label,
//! the dominant label and its confidence. Values are validated when built
//! and never change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{AnalyserError, Result};
use crate::types::emotion::Emotion;

/// Upper bound of a percentage score
pub const MAX_SCORE: u32 = 100;

/// Integer mean of `sum / count`, rounded half-up; 0 when `count` is 0
pub fn rounded_mean(sum: u64, count: usize) -> u32 {
    if count == 0 {
        return 0;
    }
    let count = count as u64;
    ((sum * 2 + count) / (count * 2)) as u32
}

/// Percentage score per label
///
/// Every label is present; labels not supplied at construction score 0.
/// Scores are not required to sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Emotion, u32>", into = "BTreeMap<Emotion, u32>")]
pub struct LabelScores {
    scores: [u32; 7],
}

impl LabelScores {
    /// Build from `(label, score)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Emotion, u32)>,
    {
        let mut scores = [0u32; 7];
        for (label, score) in pairs {
            if score > MAX_SCORE {
                return Err(AnalyserError::InvalidScore {
                    label: label.to_string(),
                    score,
                });
            }
            scores[label.index()] = score;
        }
        Ok(Self { scores })
    }

    /// Build from scores listed in label order
    pub fn from_array(scores: [u32; 7]) -> Result<Self> {
        Self::from_pairs(Emotion::ALL.iter().copied().zip(scores))
    }

    /// Build from scores in label order, clamping each to 100
    pub fn saturating(scores: [u32; 7]) -> Self {
        Self {
            scores: scores.map(|s| s.min(MAX_SCORE)),
        }
    }

    /// Score for a label
    pub fn get(&self, label: Emotion) -> u32 {
        self.scores[label.index()]
    }

    /// Iterate labels and scores in label order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u32)> + '_ {
        Emotion::ALL.iter().map(move |e| (*e, self.scores[e.index()]))
    }

    /// Label with the highest score; ties go to the earlier label
    pub fn dominant(&self) -> (Emotion, u32) {
        let mut best = (Emotion::ALL[0], self.scores[0]);
        for (label, score) in self.iter().skip(1) {
            if score > best.1 {
                best = (label, score);
            }
        }
        best
    }

    /// Sum of all scores
    pub fn total(&self) -> u32 {
        self.scores.iter().sum()
    }
}

impl TryFrom<BTreeMap<Emotion, u32>> for LabelScores {
    type Error = AnalyserError;

    fn try_from(map: BTreeMap<Emotion, u32>) -> Result<Self> {
        Self::from_pairs(map)
    }
}

impl From<LabelScores> for BTreeMap<Emotion, u32> {
    fn from(scores: LabelScores) -> Self {
        scores.iter().collect()
    }
}

/// One detection sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    emotions: LabelScores,
    dominant: Emotion,
    confidence: u32,
    timestamp: DateTime<Utc>,
}

impl InferenceResult {
    /// Create a result captured now
    pub fn new(emotions: LabelScores) -> Self {
        Self::with_timestamp(emotions, Utc::now())
    }

    /// Create a result with an explicit capture time
    pub fn with_timestamp(emotions: LabelScores, timestamp: DateTime<Utc>) -> Self {
        let (dominant, confidence) = emotions.dominant();
        Self {
            emotions,
            dominant,
            confidence,
            timestamp,
        }
    }

    /// Create a result from `(label, score)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Emotion, u32)>,
    {
        Ok(Self::new(LabelScores::from_pairs(pairs)?))
    }

    pub fn emotions(&self) -> &LabelScores {
        &self.emotions
    }

    pub fn dominant(&self) -> Emotion {
        self.dominant
    }

    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
