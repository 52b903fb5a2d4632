//! Flattening of sessions and batches into tabular rows

use serde_json::{json, Value};

use crate::batch::BatchResult;
use crate::export::tabular::Row;
use crate::session::SessionSummary;
use crate::types::{Emotion, InferenceResult};

fn insert_scores(row: &mut Row, result: &InferenceResult) {
    for (label, score) in result.emotions().iter() {
        row.insert(label.to_string(), json!(score));
    }
}

/// One row per sample: timestamp, dominant, confidence, sessionTime, then each label
pub fn session_rows(summary: &SessionSummary) -> Vec<Row> {
    summary
        .data
        .iter()
        .map(|sample| {
            let mut row = Row::new();
            row.insert("timestamp".into(), json!(sample.result.timestamp().to_rfc3339()));
            row.insert("dominant".into(), json!(sample.result.dominant()));
            row.insert("confidence".into(), json!(sample.result.confidence()));
            row.insert("sessionTime".into(), json!(sample.session_time));
            insert_scores(&mut row, &sample.result);
            row
        })
        .collect()
}

/// One row per session with its headline numbers
pub fn summary_rows(sessions: &[SessionSummary]) -> Vec<Row> {
    sessions
        .iter()
        .map(|s| {
            let mut row = Row::new();
            row.insert("sessionId".into(), json!(s.session_id));
            row.insert("startTime".into(), json!(s.start_time.to_rfc3339()));
            row.insert("duration".into(), json!(s.duration));
            row.insert("frameCount".into(), json!(s.frame_count));
            row.insert("dominantEmotion".into(), json!(s.stats.dominant));
            row.insert("avgConfidence".into(), json!(s.stats.avg_confidence));
            row
        })
        .collect()
}

/// One row per analyzed file
pub fn batch_rows(results: &[BatchResult]) -> Vec<Row> {
    results
        .iter()
        .map(|r| {
            let analysis = &r.analysis;
            let mut row = Row::new();
            row.insert("filename".into(), json!(r.filename));
            row.insert("type".into(), json!(r.media_type));
            row.insert("size".into(), json!(r.size));
            row.insert("dominant".into(), json!(analysis.result.dominant()));
            row.insert("confidence".into(), json!(analysis.result.confidence()));
            row.insert("timestamp".into(), json!(analysis.result.timestamp().to_rfc3339()));
            row.insert("frames".into(), json!(analysis.frames));
            row.insert(
                "sampledFrames".into(),
                analysis.sampled_frames.map_or(Value::Null, |n| json!(n)),
            );
            insert_scores(&mut row, &analysis.result);
            row
        })
        .collect()
}

/// Column names contributed by the per-label scores
pub fn score_columns() -> Vec<&'static str> {
    Emotion::ALL.iter().map(|e| e.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSample, SessionStats};
    use chrono::Utc;

    fn summary() -> SessionSummary {
        let data = vec![
            SessionSample {
                result: InferenceResult::from_pairs([(Emotion::Happy, 80), (Emotion::Sad, 5)]).unwrap(),
                session_time: 0,
            },
            SessionSample {
                result: InferenceResult::from_pairs([(Emotion::Sad, 60)]).unwrap(),
                session_time: 1000,
            },
        ];
        SessionSummary {
            session_id: "session_1".to_string(),
            start_time: Utc::now(),
            duration: 1,
            frame_count: 2,
            stats: SessionStats::from_samples(&data),
            data,
        }
    }

    #[test]
    fn test_session_rows_column_order() {
        let rows = session_rows(&summary());
        assert_eq!(rows.len(), 2);

        let keys: Vec<&str> = rows[0].keys().map(|k| k.as_str()).collect();
        let mut expected = vec!["timestamp", "dominant", "confidence", "sessionTime"];
        expected.extend(score_columns());
        assert_eq!(keys, expected);

        assert_eq!(rows[1]["sessionTime"], 1000);
        assert_eq!(rows[1]["dominant"], "sad");
        assert_eq!(rows[0]["sad"], 5);
    }

    #[test]
    fn test_summary_rows() {
        let rows = summary_rows(&[summary()]);
        assert_eq!(rows[0]["dominantEmotion"], "happy");
        assert_eq!(rows[0]["avgConfidence"], 70);
        assert_eq!(rows[0]["frameCount"], 2);
    }
}
