// Detection loop: drives a recorder at the configured cadence
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::errors::{AnalyserError, Result};
use crate::inference::{Frame, InferenceEngine};
use crate::session::recording::SessionRecorder;

/// Loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Delay between detections; zero runs back to back
    pub period: Duration,
    pub min_confidence: u32,
    pub max_samples: usize,
}

impl DetectionConfig {
    pub fn from_settings(settings: &Settings, max_samples: usize) -> Self {
        Self {
            period: settings.default_detection_rate.period(),
            min_confidence: settings.min_confidence,
            max_samples,
        }
    }
}

/// What a detection run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// Samples added to the session
    pub recorded: usize,
    /// Recorded samples below the confidence threshold
    pub low_confidence: usize,
    /// Inferences that failed and were skipped
    pub failed: usize,
}

/// Run detections into an active recorder until `max_samples` are recorded
///
/// Each inference is awaited before the next starts, so at most one is in
/// flight. Inference failures are counted and skipped. The loop also ends
/// after `max_samples` consecutive failures.
pub async fn run_detection<F>(
    recorder: &mut SessionRecorder,
    engine: &dyn InferenceEngine,
    config: DetectionConfig,
    mut next_frame: F,
) -> Result<DetectionReport>
where
    F: FnMut() -> Frame,
{
    let mut report = DetectionReport::default();
    let mut consecutive_failures = 0;

    let mut ticker = if config.period.is_zero() {
        None
    } else {
        let mut ticker = interval(config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    };

    while report.recorded < config.max_samples && consecutive_failures < config.max_samples {
        match ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        let frame = next_frame();
        match recorder.record(engine, &frame).await {
            Ok(()) => {
                consecutive_failures = 0;
                report.recorded += 1;
                let confidence = recorder
                    .samples()
                    .last()
                    .map(|s| s.result.confidence())
                    .unwrap_or(0);
                if confidence < config.min_confidence {
                    debug!("Low confidence detection: {}%", confidence);
                    report.low_confidence += 1;
                }
            }
            Err(AnalyserError::InferenceFailed(msg)) => {
                warn!("Analysis error: {}", msg);
                consecutive_failures += 1;
                report.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockInference;
    use crate::session::archive::SessionArchive;
    use crate::storage::KeyValueStore;
    use crate::types::{Emotion, InferenceResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recorder() -> SessionRecorder {
        SessionRecorder::new(SessionArchive::new(Arc::new(KeyValueStore::in_memory())))
    }

    fn config(period_ms: u64, max_samples: usize) -> DetectionConfig {
        DetectionConfig {
            period: Duration::from_millis(period_ms),
            min_confidence: 50,
            max_samples,
        }
    }

    /// Alternates failure and a fixed 30% "fear" result
    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceEngine for Flaky {
        async fn infer(&self, _frame: &Frame) -> Result<InferenceResult> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(AnalyserError::InferenceFailed("dropped frame".to_string()))
            } else {
                InferenceResult::from_pairs([(Emotion::Fear, 30)])
            }
        }
    }

    #[tokio::test]
    async fn test_records_requested_samples() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        let engine = MockInference::with_latency(Duration::ZERO);

        let report = run_detection(&mut recorder, &engine, config(1, 5), Frame::empty)
            .await
            .unwrap();
        assert_eq!(report.recorded, 5);
        assert_eq!(recorder.stats().count, 5);
    }

    #[tokio::test]
    async fn test_realtime_rate() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        let engine = MockInference::with_latency(Duration::ZERO);

        let report = run_detection(&mut recorder, &engine, config(0, 3), Frame::empty)
            .await
            .unwrap();
        assert_eq!(report.recorded, 3);
    }

    #[tokio::test]
    async fn test_failures_skipped_and_low_confidence_counted() {
        let mut recorder = recorder();
        recorder.start().unwrap();
        let engine = Flaky {
            calls: AtomicUsize::new(0),
        };

        let report = run_detection(&mut recorder, &engine, config(0, 3), Frame::empty)
            .await
            .unwrap();
        assert_eq!(report.recorded, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(report.low_confidence, 3);
        assert_eq!(recorder.samples().len(), 3);
    }

    #[tokio::test]
    async fn test_requires_active_session() {
        let mut recorder = recorder();
        let engine = MockInference::with_latency(Duration::ZERO);

        let err = run_detection(&mut recorder, &engine, config(0, 3), Frame::empty)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyserError::SessionNotActive { .. }));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings::default();
        let config = DetectionConfig::from_settings(&settings, 10);
        assert_eq!(config.period, Duration::from_millis(1000));
        assert_eq!(config.min_confidence, 50);
    }
}
