//! Property tests for recorder statistics and bounded histories

use std::sync::Arc;

use chrono::Utc;
use expression_analyser::{
    export::render_csv,
    session::{
        SessionArchive, SessionRecorder, SessionStats, SessionSummary, MAX_ARCHIVED_SESSIONS,
    },
    storage::{BoundedHistory, KeyValueStore},
    Emotion, InferenceResult, LabelScores,
};
use quickcheck_macros::quickcheck;
use serde_json::{Map, Value};

fn label(i: u8) -> Emotion {
    Emotion::ALL[i as usize % Emotion::ALL.len()]
}

fn summary(id: usize) -> SessionSummary {
    SessionSummary {
        session_id: format!("s{}", id),
        start_time: Utc::now(),
        duration: 0,
        frame_count: 0,
        data: Vec::new(),
        stats: SessionStats::default(),
    }
}

#[quickcheck]
fn sample_count_matches_calls(samples: Vec<(u8, u8)>) -> bool {
    let mut recorder = SessionRecorder::new(SessionArchive::new(Arc::new(KeyValueStore::in_memory())));
    recorder.start().unwrap();

    for (l, score) in &samples {
        let result = InferenceResult::from_pairs([(label(*l), *score as u32 % 101)]).unwrap();
        recorder.add_result(result).unwrap();
    }

    recorder.stats().count == samples.len()
}

#[quickcheck]
fn average_confidence_within_bounds(scores: Vec<u8>) -> bool {
    let mut recorder = SessionRecorder::new(SessionArchive::new(Arc::new(KeyValueStore::in_memory())));
    recorder.start().unwrap();

    let scores: Vec<u32> = scores.iter().map(|s| *s as u32 % 101).collect();
    for score in &scores {
        recorder
            .add_result(InferenceResult::from_pairs([(Emotion::Angry, *score)]).unwrap())
            .unwrap();
    }

    let avg = recorder.stats().avg_confidence;
    match (scores.iter().min(), scores.iter().max()) {
        (Some(min), Some(max)) => *min <= avg && avg <= *max,
        _ => avg == 0,
    }
}

#[quickcheck]
fn archive_never_exceeds_cap(appends: u8) -> bool {
    let archive = SessionArchive::new(Arc::new(KeyValueStore::in_memory()));
    for i in 0..appends as usize {
        archive.append(summary(i));
    }

    let sessions = archive.list(None);
    let newest_first = appends == 0 || sessions[0].session_id == format!("s{}", appends - 1);
    sessions.len() == (appends as usize).min(MAX_ARCHIVED_SESSIONS) && newest_first
}

#[quickcheck]
fn bounded_history_keeps_newest(entries: Vec<u16>, capacity: u8) -> bool {
    let capacity = capacity as usize % 8 + 1;
    let history: BoundedHistory<u16> =
        BoundedHistory::new(Arc::new(KeyValueStore::in_memory()), "prop", capacity);
    for entry in &entries {
        history.push_front(*entry);
    }

    let expected: Vec<u16> = entries.iter().rev().take(capacity).copied().collect();
    history.load() == expected
}

#[quickcheck]
fn dominant_is_highest_score(scores: Vec<u8>) -> bool {
    let mut array = [0u32; 7];
    for (slot, score) in array.iter_mut().zip(scores.iter()) {
        *slot = *score as u32 % 101;
    }
    let scores = LabelScores::from_array(array).unwrap();
    let (_, confidence) = scores.dominant();
    confidence == array.iter().copied().max().unwrap_or(0)
}

#[quickcheck]
fn rejects_scores_above_one_hundred(excess: u16) -> bool {
    let score = 101 + excess as u32;
    InferenceResult::from_pairs([(Emotion::Happy, score)]).is_err()
}

#[quickcheck]
fn csv_has_one_line_per_row(values: Vec<i32>) -> bool {
    let rows: Vec<Map<String, Value>> = values
        .iter()
        .map(|v| {
            let mut row = Map::new();
            row.insert("value".to_string(), Value::from(*v));
            row
        })
        .collect();

    match render_csv(&rows).unwrap() {
        Some(csv) => csv.lines().count() == rows.len() + 1,
        None => rows.is_empty(),
    }
}
