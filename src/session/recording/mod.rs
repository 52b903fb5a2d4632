pub mod recorder;

pub use recorder::{
    RecorderState, SessionRecorder, SessionSample, SessionStats, SessionSummary, StopOutcome,
};
