//! Error types for the expression analyser
//!
//! Provides a single error enum for the library with context carried in
//! each variant. Storage failures are reported through these variants but
//! callers of the key-value store only ever see `bool`/`Option`.

use thiserror::Error;

/// Main error type for the expression analyser
#[derive(Error, Debug)]
pub enum AnalyserError {
    /// `start()` called while a session is already recording
    #[error("Session {session_id} is already active")]
    AlreadyActive { session_id: String },

    /// Operation requires an active session
    #[error("No active session: recorder is {state}")]
    SessionNotActive { state: String },

    /// Label score outside of the [0, 100] percentage range
    #[error("Invalid score {score} for label {label}: must be within 0..=100")]
    InvalidScore { label: String, score: u32 },

    /// Inference backend failure
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    /// Export requested with no input rows or sessions
    #[error("Nothing to export")]
    NothingToExport,

    /// Batch processing requested with no pending items
    #[error("No pending files to process")]
    NothingToProcess,

    /// Storage backend rejected a write because of its quota
    #[error("Storage quota exceeded: {required} bytes > {quota} bytes")]
    QuotaExceeded { required: usize, quota: usize },

    /// Storage backend errors
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for analyser operations
pub type Result<T> = std::result::Result<T, AnalyserError>;

/// Convert anyhow errors to AnalyserError
impl From<anyhow::Error> for AnalyserError {
    fn from(err: anyhow::Error) -> Self {
        AnalyserError::Generic(err.to_string())
    }
}
