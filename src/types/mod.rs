//! Type definitions module
//!
//! Emotion labels and detection samples shared by every component.

pub mod emotion;
pub mod inference;

// Re-export commonly used types
pub use emotion::Emotion;
pub use inference::{rounded_mean, InferenceResult, LabelScores};
