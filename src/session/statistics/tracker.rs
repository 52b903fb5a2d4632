// Archive statistics: dashboard aggregates over archived sessions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::session::recording::SessionSummary;
use crate::types::{rounded_mean, Emotion, LabelScores};

/// Sessions shown in the confidence trend
pub const TREND_WINDOW: usize = 10;

/// Sessions compared side by side
pub const COMPARISON_WINDOW: usize = 3;

/// Average confidence of one session, for trend charts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub avg_confidence: u32,
}

/// Per-label averages of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComparison {
    pub session_id: String,
    pub averages: LabelScores,
}

/// Aggregates over a newest-first list of sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOverview {
    /// Total number of sessions
    pub total_sessions: usize,
    /// Total frames across all sessions
    pub total_frames: usize,
    /// Mean session length in whole minutes (floored)
    pub avg_duration_minutes: u64,
    /// Most common session-level dominant label
    pub dominant_emotion: Emotion,
    /// Sessions per dominant label
    pub distribution: BTreeMap<Emotion, usize>,
    /// Mean session confidence per dominant label (half-up)
    pub confidence_by_emotion: BTreeMap<Emotion, u32>,
    /// Most recent sessions, oldest first
    pub confidence_trend: Vec<TrendPoint>,
    /// Most recent sessions, newest first
    pub comparison: Vec<SessionComparison>,
}

impl ArchiveOverview {
    /// Compute the overview; `sessions` must be ordered newest first
    pub fn from_sessions(sessions: &[SessionSummary]) -> Self {
        let total_sessions = sessions.len();
        let total_frames = sessions.iter().map(|s| s.frame_count).sum();

        let total_duration: u64 = sessions.iter().map(|s| s.duration).sum();
        let avg_duration_minutes = if total_sessions > 0 {
            total_duration / total_sessions as u64 / 60
        } else {
            0
        };

        let mut distribution: BTreeMap<Emotion, usize> =
            Emotion::ALL.iter().map(|e| (*e, 0)).collect();
        let mut confidence_sums: BTreeMap<Emotion, u64> = BTreeMap::new();
        for session in sessions {
            let label = session.stats.dominant;
            *distribution.entry(label).or_insert(0) += 1;
            *confidence_sums.entry(label).or_insert(0) += session.stats.avg_confidence as u64;
        }

        let confidence_by_emotion = Emotion::ALL
            .iter()
            .map(|e| {
                let sum = confidence_sums.get(e).copied().unwrap_or(0);
                let count = distribution.get(e).copied().unwrap_or(0);
                (*e, rounded_mean(sum, count))
            })
            .collect();

        let confidence_trend = sessions
            .iter()
            .take(TREND_WINDOW)
            .rev()
            .map(|s| TrendPoint {
                session_id: s.session_id.clone(),
                start_time: s.start_time,
                avg_confidence: s.stats.avg_confidence,
            })
            .collect();

        let comparison = sessions
            .iter()
            .take(COMPARISON_WINDOW)
            .map(|s| SessionComparison {
                session_id: s.session_id.clone(),
                averages: s.emotion_averages(),
            })
            .collect();

        Self {
            total_sessions,
            total_frames,
            avg_duration_minutes,
            dominant_emotion: dominant_by_count(&distribution),
            distribution,
            confidence_by_emotion,
            confidence_trend,
            comparison,
        }
    }
}

/// Label with the highest count; ties and all-zero counts follow label order,
/// with `neutral` when nothing was counted
fn dominant_by_count(counts: &BTreeMap<Emotion, usize>) -> Emotion {
    let mut best: Option<(Emotion, usize)> = None;
    for label in Emotion::ALL {
        let count = counts.get(&label).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label).unwrap_or_default()
}
