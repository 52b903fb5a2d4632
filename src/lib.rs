//! Expression Analyser v0.3.0
//!
//! Records facial-expression detections into sessions, archives finished
//! sessions, aggregates them for dashboards and exports them as JSON or CSV.
//!
//! # Architecture
//!
//! - **Storage**: namespaced key-value persistence with bounded histories
//! - **Inference**: pluggable engine trait with a mock backend
//! - **Session**: recorder state machine, archive, statistics, detection loop
//! - **Export**: structured and tabular serializers plus full backups
//! - **Batch**: queued image/video analysis with a saved history

pub mod errors;
pub mod types;
pub mod storage;
pub mod inference;
pub mod session;
pub mod export;
pub mod batch;
pub mod config;
pub mod cli;

// Re-export commonly used types
pub use errors::{AnalyserError, Result};
pub use types::{Emotion, InferenceResult, LabelScores};
