// Session recording, archiving and dashboard statistics
//
// Components:
// - Session Recorder: Idle -> Active -> Finalized state machine over samples
// - Session Archive: bounded newest-first history of finished sessions
// - Statistics: dashboard aggregates over archived sessions
// - Detection: paced loop feeding inference results into a recorder
// - Demo: synthetic sessions for thin histories

pub mod archive;
pub mod demo;
pub mod detection;
pub mod recording;
pub mod statistics;

// Re-export key types
pub use archive::{SessionArchive, TimeRange, MAX_ARCHIVED_SESSIONS, MIN_DASHBOARD_SESSIONS};
pub use detection::{run_detection, DetectionConfig, DetectionReport};
pub use recording::{
    RecorderState, SessionRecorder, SessionSample, SessionStats, SessionSummary, StopOutcome,
};
pub use statistics::ArchiveOverview;
