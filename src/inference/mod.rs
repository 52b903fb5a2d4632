//! Expression inference
//!
//! The [`InferenceEngine`] trait is the seam a real model would plug into.
//! [`MockInference`] is the only engine shipped: it sleeps for a simulated
//! latency and returns a random distribution over the seven labels.

pub mod media;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

use crate::errors::{AnalyserError, Result};
use crate::types::{InferenceResult, LabelScores};

pub use media::{analyze_image, analyze_video, MediaAnalysis, MAX_VIDEO_SAMPLES};

/// Default simulated inference latency
pub const DEFAULT_LATENCY_MS: u64 = 100;

/// A captured image frame
///
/// The mock engine accepts frames without looking at them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// Zero-sized placeholder frame
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Produces one [`InferenceResult`] per frame
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Analyze a frame; failures map to [`AnalyserError::InferenceFailed`]
    async fn infer(&self, frame: &Frame) -> Result<InferenceResult>;
}

/// Synthetic inference with uniform random scores
///
/// Scores are normalized to percentages and rounded individually, so they
/// sum to roughly (not exactly) 100.
pub struct MockInference {
    latency: Duration,
    rng: Option<Mutex<StdRng>>,
}

impl MockInference {
    /// Engine with the default latency
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(DEFAULT_LATENCY_MS))
    }

    /// Engine with a custom latency
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency, rng: None }
    }

    /// Reproducible engine for tests and demos
    pub fn seeded(seed: u64, latency: Duration) -> Self {
        Self {
            latency,
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn draw(&self) -> Result<[f64; 7]> {
        let mut raw = [0.0f64; 7];
        match &self.rng {
            Some(rng) => {
                let mut rng = rng
                    .lock()
                    .map_err(|e| AnalyserError::InferenceFailed(format!("rng lock poisoned: {}", e)))?;
                raw.iter_mut().for_each(|v| *v = rng.gen::<f64>());
            }
            None => {
                let mut rng = rand::thread_rng();
                raw.iter_mut().for_each(|v| *v = rng.gen::<f64>());
            }
        }
        Ok(raw)
    }

    fn generate(&self) -> Result<InferenceResult> {
        let raw = self.draw()?;
        let total: f64 = raw.iter().sum();

        let mut scores = [0u32; 7];
        for (score, value) in scores.iter_mut().zip(raw.iter()) {
            *score = if total > 0.0 {
                ((value / total) * 100.0).round() as u32
            } else {
                0
            };
        }

        Ok(InferenceResult::new(LabelScores::from_array(scores)?))
    }
}

impl Default for MockInference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for MockInference {
    async fn infer(&self, _frame: &Frame) -> Result<InferenceResult> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.generate()
    }
}
