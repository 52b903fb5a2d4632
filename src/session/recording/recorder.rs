// Session Recorder for expression sample tracking
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AnalyserError, Result};
use crate::inference::media::average_scores;
use crate::inference::{Frame, InferenceEngine};
use crate::session::archive::SessionArchive;
use crate::types::emotion::most_frequent;
use crate::types::{rounded_mean, Emotion, InferenceResult, LabelScores};

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Idle,
    Active,
    Finalized,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::Idle => "idle",
            RecorderState::Active => "active",
            RecorderState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Inference result tagged with its offset into the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSample {
    #[serde(flatten)]
    pub result: InferenceResult,
    /// Milliseconds since session start
    pub session_time: u64,
}

/// Aggregate statistics over a session's samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub count: usize,
    pub dominant: Emotion,
    pub avg_confidence: u32,
}

impl SessionStats {
    /// Compute stats; empty input yields the neutral zero value
    pub fn from_samples(samples: &[SessionSample]) -> Self {
        let dominant = most_frequent(samples.iter().map(|s| s.result.dominant()))
            .unwrap_or_default();
        let total_confidence: u64 = samples
            .iter()
            .map(|s| s.result.confidence() as u64)
            .sum();

        Self {
            count: samples.len(),
            dominant,
            avg_confidence: rounded_mean(total_confidence, samples.len()),
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::from_samples(&[])
    }
}

/// Finalized, immutable record of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    /// Whole seconds, floored
    pub duration: u64,
    pub frame_count: usize,
    pub data: Vec<SessionSample>,
    pub stats: SessionStats,
}

impl SessionSummary {
    /// Per-label mean score across samples (half-up); all zero with no samples
    pub fn emotion_averages(&self) -> LabelScores {
        let results: Vec<InferenceResult> = self.data.iter().map(|s| s.result.clone()).collect();
        average_scores(&results)
    }
}

/// Result of stopping an active session
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub summary: SessionSummary,
    /// Whether the summary was written to the archive
    pub archived: bool,
}

/// Records one session at a time: `Idle → Active → Finalized`
///
/// Assumes a single sequential producer; callers serialize `add_result`.
pub struct SessionRecorder {
    archive: SessionArchive,
    auto_archive: bool,
    state: RecorderState,
    session_id: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    samples: Vec<SessionSample>,
}

impl SessionRecorder {
    /// Create an idle recorder writing finished sessions to `archive`
    pub fn new(archive: SessionArchive) -> Self {
        Self {
            archive,
            auto_archive: true,
            state: RecorderState::Idle,
            session_id: None,
            start_time: None,
            end_time: None,
            samples: Vec::new(),
        }
    }

    /// Whether `stop()` writes non-empty sessions to the archive
    pub fn set_auto_archive(&mut self, enabled: bool) {
        self.auto_archive = enabled;
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RecorderState::Active
    }

    /// Current or last session ID
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Samples of the current or last session
    pub fn samples(&self) -> &[SessionSample] {
        &self.samples
    }

    pub fn archive(&self) -> &SessionArchive {
        &self.archive
    }

    /// Begin a new session; fails with `AlreadyActive` while recording
    pub fn start(&mut self) -> Result<&str> {
        if let (RecorderState::Active, Some(id)) = (self.state, &self.session_id) {
            return Err(AnalyserError::AlreadyActive {
                session_id: id.clone(),
            });
        }
        Ok(self.begin())
    }

    /// Discard any active session and begin a new one
    pub fn restart(&mut self) -> &str {
        if self.is_active() {
            warn!(
                "Discarding active session {} with {} samples",
                self.session_id.as_deref().unwrap_or("?"),
                self.samples.len()
            );
        }
        self.begin()
    }

    fn begin(&mut self) -> &str {
        let id = format!("session_{}", Uuid::new_v4());
        debug!("Session {} {} -> active", id, self.state);

        self.state = RecorderState::Active;
        self.start_time = Some(Utc::now());
        self.end_time = None;
        self.samples.clear();
        self.session_id.insert(id).as_str()
    }

    /// Append a result to the active session
    pub fn add_result(&mut self, result: InferenceResult) -> Result<()> {
        let start = match (self.state, self.start_time) {
            (RecorderState::Active, Some(start)) => start,
            _ => {
                return Err(AnalyserError::SessionNotActive {
                    state: self.state.to_string(),
                })
            }
        };

        self.samples.push(SessionSample {
            result,
            session_time: elapsed_millis(start, Utc::now()),
        });
        Ok(())
    }

    /// Run one inference and record its result
    ///
    /// On failure the samples are left untouched.
    pub async fn record(&mut self, engine: &dyn InferenceEngine, frame: &Frame) -> Result<()> {
        if !self.is_active() {
            return Err(AnalyserError::SessionNotActive {
                state: self.state.to_string(),
            });
        }

        let result = engine.infer(frame).await.map_err(|e| match e {
            AnalyserError::InferenceFailed(msg) => AnalyserError::InferenceFailed(msg),
            other => AnalyserError::InferenceFailed(other.to_string()),
        })?;

        self.add_result(result)
    }

    /// Statistics for the current or last session
    pub fn stats(&self) -> SessionStats {
        SessionStats::from_samples(&self.samples)
    }

    /// Seconds since start (floored), frozen once the session stops
    pub fn duration_secs(&self) -> u64 {
        match self.start_time {
            Some(start) => elapsed_millis(start, self.end_time.unwrap_or_else(Utc::now)) / 1000,
            None => 0,
        }
    }

    /// Finalize the active session
    ///
    /// Returns `None` when no session is active. Sessions without samples
    /// are summarized but not archived.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        if !self.is_active() {
            return None;
        }

        self.end_time = Some(Utc::now());
        self.state = RecorderState::Finalized;

        let summary = self.summary()?;
        debug!("Session {} active -> finalized", summary.session_id);

        let archived = if summary.data.is_empty() {
            debug!("Session {} has no samples, not archiving", summary.session_id);
            false
        } else if !self.auto_archive {
            debug!("Auto-archive disabled, keeping session {} in memory", summary.session_id);
            false
        } else {
            let archived = self.archive.append(summary.clone());
            if archived {
                info!(
                    "Archived session {} ({} samples, {}s)",
                    summary.session_id, summary.frame_count, summary.duration
                );
            }
            archived
        };

        Some(StopOutcome { summary, archived })
    }

    /// Snapshot of the current or last session
    pub fn summary(&self) -> Option<SessionSummary> {
        let session_id = self.session_id.clone()?;
        let start_time = self.start_time?;

        Some(SessionSummary {
            session_id,
            start_time,
            duration: self.duration_secs(),
            frame_count: self.samples.len(),
            data: self.samples.clone(),
            stats: self.stats(),
        })
    }
}

fn elapsed_millis(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockInference;
    use crate::storage::KeyValueStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    fn recorder() -> SessionRecorder {
        SessionRecorder::new(SessionArchive::new(Arc::new(KeyValueStore::in_memory())))
    }

    fn result(label: Emotion, score: u32) -> InferenceResult {
        InferenceResult::from_pairs([(label, score)]).unwrap()
    }

    #[test]
    fn test_recorder_creation() {
        let recorder = recorder();
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(recorder.session_id().is_none());
        assert_eq!(recorder.duration_secs(), 0);
    }

    #[test]
    fn test_start_generates_unique_ids() {
        let mut recorder = recorder();
        let first = recorder.start().unwrap().to_string();
        recorder.stop();
        let second = recorder.start().unwrap().to_string();

        assert!(first.starts_with("session_"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_double_start_rejected() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();

        let err = recorder.start().unwrap_err();
        assert!(matches!(err, AnalyserError::AlreadyActive { .. }));
        assert_eq!(recorder.samples().len(), 1);
    }

    #[test]
    fn test_restart_discards_samples() {
        let mut recorder = recorder();
        let first = recorder.start().unwrap().to_string();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();

        let second = recorder.restart().to_string();
        assert_ne!(first, second);
        assert!(recorder.samples().is_empty());
        assert!(recorder.is_active());
    }

    #[test]
    fn test_add_result_requires_active() {
        let mut recorder = recorder();
        let err = recorder.add_result(result(Emotion::Sad, 50)).unwrap_err();
        assert!(matches!(err, AnalyserError::SessionNotActive { .. }));

        recorder.start().unwrap();
        recorder.stop();
        assert!(recorder.add_result(result(Emotion::Sad, 50)).is_err());
        assert!(recorder.samples().is_empty());
    }

    #[test]
    fn test_empty_stats_default() {
        let recorder = recorder();
        let stats = recorder.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.dominant, Emotion::Neutral);
        assert_eq!(stats.avg_confidence, 0);
    }

    #[test]
    fn test_stats_aggregation() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();
        recorder.add_result(result(Emotion::Sad, 60)).unwrap();
        recorder.add_result(result(Emotion::Sad, 65)).unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.dominant, Emotion::Sad);
        // (80 + 60 + 65) / 3 = 68.33
        assert_eq!(stats.avg_confidence, 68);
    }

    #[test]
    fn test_stats_tie_goes_to_first_encountered() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Angry, 51)).unwrap();
        recorder.add_result(result(Emotion::Happy, 50)).unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.dominant, Emotion::Angry);
        // 50.5 rounds half-up
        assert_eq!(stats.avg_confidence, 51);
    }

    #[test]
    fn test_session_time_is_monotonic() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        for _ in 0..5 {
            recorder.add_result(result(Emotion::Fear, 40)).unwrap();
        }
        let times: Vec<u64> = recorder.samples().iter().map(|s| s.session_time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_stop_archives_non_empty_session() {
        let mut recorder = recorder();
        let id = recorder.start().unwrap().to_string();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();
        recorder.add_result(result(Emotion::Sad, 60)).unwrap();

        let outcome = recorder.stop().unwrap();
        assert!(outcome.archived);
        assert_eq!(outcome.summary.session_id, id);
        assert_eq!(outcome.summary.stats.dominant, Emotion::Happy);
        assert_eq!(outcome.summary.stats.avg_confidence, 70);
        assert_eq!(outcome.summary.frame_count, 2);

        let archived = recorder.archive().list(None);
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].session_id, id);
        assert_eq!(recorder.state(), RecorderState::Finalized);
    }

    #[test]
    fn test_stop_discards_empty_session() {
        let mut recorder = recorder();
        recorder.start().unwrap();

        let outcome = recorder.stop().unwrap();
        assert!(!outcome.archived);
        assert_eq!(outcome.summary.frame_count, 0);
        assert!(recorder.archive().list(None).is_empty());
    }

    #[test]
    fn test_auto_archive_disabled() {
        let mut recorder = recorder();
        recorder.set_auto_archive(false);
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();

        let outcome = recorder.stop().unwrap();
        assert!(!outcome.archived);
        assert_eq!(outcome.summary.frame_count, 1);
        assert!(recorder.archive().is_empty());
    }

    #[test]
    fn test_stop_when_not_active_is_noop() {
        let mut recorder = recorder();
        assert!(recorder.stop().is_none());

        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Happy, 90)).unwrap();
        recorder.stop();
        assert!(recorder.stop().is_none());
        assert_eq!(recorder.archive().list(None).len(), 1);
    }

    #[test]
    fn test_stats_survive_stop() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Surprised, 77)).unwrap();
        recorder.stop();

        assert_eq!(recorder.stats().count, 1);
        assert_eq!(recorder.stats().dominant, Emotion::Surprised);
    }

    #[test]
    fn test_emotion_averages() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder
            .add_result(InferenceResult::from_pairs([(Emotion::Happy, 40), (Emotion::Sad, 10)]).unwrap())
            .unwrap();
        recorder
            .add_result(InferenceResult::from_pairs([(Emotion::Happy, 45), (Emotion::Sad, 20)]).unwrap())
            .unwrap();

        let averages = recorder.summary().unwrap().emotion_averages();
        assert_eq!(averages.get(Emotion::Happy), 43);
        assert_eq!(averages.get(Emotion::Sad), 15);
        assert_eq!(averages.get(Emotion::Neutral), 0);
    }

    struct FailingEngine;

    #[async_trait]
    impl InferenceEngine for FailingEngine {
        async fn infer(&self, _frame: &Frame) -> Result<InferenceResult> {
            Err(AnalyserError::Generic("camera unplugged".to_string()))
        }
    }

    #[tokio::test]
    async fn test_record_with_engine() {
        let mut recorder = recorder();
        let engine = MockInference::with_latency(Duration::ZERO);

        assert!(recorder.record(&engine, &Frame::empty()).await.is_err());

        recorder.start().unwrap();
        recorder.record(&engine, &Frame::empty()).await.unwrap();
        recorder.record(&engine, &Frame::empty()).await.unwrap();
        assert_eq!(recorder.stats().count, 2);
    }

    #[tokio::test]
    async fn test_record_failure_leaves_samples_intact() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        recorder.add_result(result(Emotion::Happy, 80)).unwrap();

        let err = recorder.record(&FailingEngine, &Frame::empty()).await.unwrap_err();
        assert!(matches!(err, AnalyserError::InferenceFailed(msg) if msg.contains("camera")));
        assert_eq!(recorder.samples().len(), 1);
        assert!(recorder.is_active());
    }
}
