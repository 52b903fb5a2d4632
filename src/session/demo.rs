// Synthetic sessions for dashboards with too little real history
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::session::recording::{SessionStats, SessionSummary};
use crate::types::LabelScores;

/// Demo sessions generated when real history is too thin
pub const DEMO_SESSION_COUNT: usize = 15;

/// Random sessions from the last week, newest first
pub fn generate_demo_sessions(count: usize) -> Vec<SessionSummary> {
    generate_demo_sessions_with(&mut rand::thread_rng(), count, Utc::now())
}

/// [`generate_demo_sessions`] with an explicit RNG and clock
pub fn generate_demo_sessions_with<R: Rng>(
    rng: &mut R,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<SessionSummary> {
    let mut sessions: Vec<SessionSummary> = (0..count)
        .map(|_| {
            let hours_ago: f64 = rng.gen_range(0.0..168.0);
            let start_time = now - Duration::milliseconds((hours_ago * 3_600_000.0) as i64);
            let duration: u64 = rng.gen_range(60..360);
            let frame_count = (duration / 2) as usize + rng.gen_range(0..50);

            let raw: Vec<f64> = (0..7).map(|_| rng.gen_range(20.0..50.0)).collect();
            let total: f64 = raw.iter().sum();
            let mut scores = [0u32; 7];
            for (score, value) in scores.iter_mut().zip(&raw) {
                *score = ((value / total) * 100.0).round() as u32;
            }
            let (dominant, _) = LabelScores::saturating(scores).dominant();

            SessionSummary {
                session_id: format!("demo_{}", Uuid::new_v4()),
                start_time,
                duration,
                frame_count,
                data: Vec::new(),
                stats: SessionStats {
                    count: frame_count,
                    dominant,
                    avg_confidence: rng.gen_range(70..90),
                },
            }
        })
        .collect();

    sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    sessions
}

/// Substitute demo data when fewer than `min` real sessions are available
///
/// Returns the sessions to display and whether they are synthetic.
pub fn with_demo_fallback(sessions: Vec<SessionSummary>, min: usize) -> (Vec<SessionSummary>, bool) {
    if sessions.len() < min {
        (generate_demo_sessions(DEMO_SESSION_COUNT), true)
    } else {
        (sessions, false)
    }
}
