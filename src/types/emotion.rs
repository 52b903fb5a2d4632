//! Emotion label set
//!
//! The label set is closed and ordered. Every tie-break in the crate that
//! refers to "label order" means the order of [`Emotion::ALL`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AnalyserError;

/// One of the seven recognised facial expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Fear,
    Disgust,
    Neutral,
}

impl Emotion {
    /// All labels in their fixed order
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fear,
        Emotion::Disgust,
        Emotion::Neutral,
    ];

    /// Lowercase label name as persisted and exported
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    /// Position in the fixed label order
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = AnalyserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| AnalyserError::Generic(format!("Unknown emotion label: {}", s)))
    }
}

/// Most frequent label in `labels`; ties go to the label seen first
///
/// Returns `None` for an empty iterator.
pub fn most_frequent<I>(labels: I) -> Option<Emotion>
where
    I: IntoIterator<Item = Emotion>,
{
    // (label, count) in first-seen order
    let mut counts: Vec<(Emotion, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(Emotion, usize)> = None;
    for (label, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label)
}
