// Session Archive: bounded persisted history of finished sessions
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AnalyserError;
use crate::session::recording::SessionSummary;
use crate::storage::{BoundedHistory, KeyValueStore, SESSIONS_KEY};

/// Maximum archived sessions
pub const MAX_ARCHIVED_SESSIONS: usize = 50;

/// Filter results below this size are candidates for demo substitution
pub const MIN_DASHBOARD_SESSIONS: usize = 10;

/// Time window for listing archived sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// Last 24 hours
    Today,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// No cutoff
    All,
    /// Last N milliseconds
    Within(u64),
}

impl TimeRange {
    /// Earliest excluded start time, or `None` for [`TimeRange::All`]
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = match self {
            TimeRange::Today => Duration::hours(24),
            TimeRange::Week => Duration::days(7),
            TimeRange::Month => Duration::days(30),
            TimeRange::All => return None,
            TimeRange::Within(ms) => Duration::milliseconds(i64::try_from(*ms).unwrap_or(i64::MAX)),
        };
        now.checked_sub_signed(window)
    }

    /// Whether a session started at `start` falls inside the window
    pub fn contains(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.cutoff(now) {
            Some(cutoff) => start > cutoff,
            None => true,
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::Week
    }
}

impl FromStr for TimeRange {
    type Err = AnalyserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => other
                .strip_suffix("ms")
                .and_then(|n| n.parse::<u64>().ok())
                .map(TimeRange::Within)
                .ok_or_else(|| AnalyserError::Generic(format!("Unknown time range: {}", s))),
        }
    }
}

/// Newest-first archive of session summaries, capped at 50
#[derive(Debug, Clone)]
pub struct SessionArchive {
    history: BoundedHistory<SessionSummary>,
}

impl SessionArchive {
    /// Archive stored under the `sessions` key of `store`
    pub fn new(store: Arc<KeyValueStore>) -> Self {
        Self {
            history: BoundedHistory::new(store, SESSIONS_KEY, MAX_ARCHIVED_SESSIONS),
        }
    }

    /// Insert at the front and evict past the cap
    ///
    /// Not atomic: concurrent appends from two writers can lose one.
    pub fn append(&self, summary: SessionSummary) -> bool {
        self.history.push_front(summary)
    }

    /// Archived sessions, newest first, optionally limited to a time window
    pub fn list(&self, filter: Option<TimeRange>) -> Vec<SessionSummary> {
        self.list_at(filter, Utc::now())
    }

    /// [`list`](Self::list) against an explicit clock
    pub fn list_at(&self, filter: Option<TimeRange>, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let sessions = self.history.load();
        match filter {
            Some(range) => sessions
                .into_iter()
                .filter(|s| range.contains(s.start_time, now))
                .collect(),
            None => sessions,
        }
    }

    /// Look up a session by ID
    pub fn get(&self, session_id: &str) -> Option<SessionSummary> {
        self.history
            .load()
            .into_iter()
            .find(|s| s.session_id == session_id)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Remove sessions older than `days`; returns how many were dropped
    pub fn prune_older_than(&self, days: u32) -> usize {
        self.prune_older_than_at(days, Utc::now())
    }

    pub fn prune_older_than_at(&self, days: u32, now: DateTime<Utc>) -> usize {
        let sessions = match self.history.try_load() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Skipping prune, archive unreadable: {}", e);
                return 0;
            }
        };
        let before = sessions.len();
        let range = TimeRange::Within(u64::from(days) * 24 * 60 * 60 * 1000);
        let kept: Vec<SessionSummary> = sessions
            .into_iter()
            .filter(|s| range.contains(s.start_time, now))
            .collect();

        let removed = before - kept.len();
        if removed > 0 && self.history.replace(kept) {
            info!("Pruned {} sessions older than {} days", removed, days);
        }
        removed
    }

    /// Drop every archived session
    pub fn clear(&self) {
        self.history.clear();
    }
}
