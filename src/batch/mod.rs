//! Batch analysis of uploaded media
//!
//! Files are queued as [`MediaItem`]s and processed one at a time through an
//! [`InferenceEngine`]. A failed item is marked and skipped; the rest of the
//! queue still runs. Finished batches can be saved to a bounded history.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AnalyserError, Result};
use crate::inference::{analyze_image, analyze_video, Frame, InferenceEngine, MediaAnalysis};
use crate::storage::{BoundedHistory, KeyValueStore, BATCHES_KEY};
use crate::types::emotion::most_frequent;
use crate::types::Emotion;

/// Maximum saved batches
pub const MAX_SAVED_BATCHES: usize = 20;

/// Default video sampling: analyze every 10th frame
pub const DEFAULT_VIDEO_SAMPLING: u32 = 10;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv"];

/// What kind of media an item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaKind {
    Image { width: u32, height: u32 },
    #[serde(rename_all = "camelCase")]
    Video { frame_count: u32 },
}

/// Processing status of a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One uploaded file in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub filename: String,
    /// MIME type, e.g. `image/jpeg`
    pub media_type: String,
    pub size: u64,
    pub kind: MediaKind,
    pub status: ItemStatus,
    pub result: Option<MediaAnalysis>,
    pub error: Option<String>,
}

impl MediaItem {
    pub fn image(filename: impl Into<String>, size: u64, width: u32, height: u32) -> Self {
        let filename = filename.into();
        let media_type = mime_for(&filename, "image");
        Self::new(filename, media_type, size, MediaKind::Image { width, height })
    }

    pub fn video(filename: impl Into<String>, size: u64, frame_count: u32) -> Self {
        let filename = filename.into();
        let media_type = mime_for(&filename, "video");
        Self::new(filename, media_type, size, MediaKind::Video { frame_count })
    }

    fn new(filename: String, media_type: String, size: u64, kind: MediaKind) -> Self {
        Self {
            filename,
            media_type,
            size,
            kind,
            status: ItemStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Queue a file from disk, classified by extension
    ///
    /// Files are not decoded: images report 0×0 and videos get a mock
    /// frame count.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Self::image(filename, metadata.len(), 0, 0))
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            let frame_count = rand::thread_rng().gen_range(10..110);
            Ok(Self::video(filename, metadata.len(), frame_count))
        } else {
            Err(AnalyserError::Generic(format!(
                "Unsupported file type: {}",
                path.display()
            )))
        }
    }
}

fn mime_for(filename: &str, family: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let subtype = match extension.as_str() {
        "jpg" | "jpeg" => "jpeg",
        "" => "octet-stream",
        "mov" => "quicktime",
        "avi" => "x-msvideo",
        "mkv" => "x-matroska",
        other => other,
    };
    format!("{}/{}", family, subtype)
}

/// Analysis of one completed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub filename: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: u64,
    #[serde(flatten)]
    pub analysis: MediaAnalysis,
}

/// Saved batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub file_count: usize,
    pub results: Vec<BatchResult>,
}

/// Newest-first history of saved batches, capped at 20
#[derive(Debug, Clone)]
pub struct BatchHistory {
    history: BoundedHistory<BatchRecord>,
}

impl BatchHistory {
    pub fn new(store: Arc<KeyValueStore>) -> Self {
        Self {
            history: BoundedHistory::new(store, BATCHES_KEY, MAX_SAVED_BATCHES),
        }
    }

    pub fn append(&self, record: BatchRecord) -> bool {
        self.history.push_front(record)
    }

    pub fn list(&self) -> Vec<BatchRecord> {
        self.history.load()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&self) {
        self.history.clear();
    }
}

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    /// Most frequent dominant label across results; `None` before any result
    pub dominant: Option<Emotion>,
    /// Results per dominant label
    pub distribution: BTreeMap<Emotion, usize>,
}

/// Sequential processor for a queue of media items
pub struct BatchProcessor {
    items: Vec<MediaItem>,
    results: Vec<BatchResult>,
    video_sampling: u32,
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self::with_video_sampling(DEFAULT_VIDEO_SAMPLING)
    }

    /// Processor sampling every `video_sampling`-th video frame
    pub fn with_video_sampling(video_sampling: u32) -> Self {
        Self {
            items: Vec::new(),
            results: Vec::new(),
            video_sampling: video_sampling.max(1),
        }
    }

    pub fn add(&mut self, item: MediaItem) {
        self.items.push(item);
    }

    /// Remove a queued item by index
    pub fn remove(&mut self, index: usize) -> Option<MediaItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn results(&self) -> &[BatchResult] {
        &self.results
    }

    pub fn pending_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .count()
    }

    /// Share of items no longer pending, rounded half-up
    pub fn progress_percent(&self) -> u32 {
        let done = self.items.len() - self.pending_count();
        crate::types::rounded_mean(done as u64 * 100, self.items.len())
    }

    /// Process the next pending item; returns its index or `None` when done
    pub async fn process_next(&mut self, engine: &dyn InferenceEngine) -> Option<usize> {
        let index = self
            .items
            .iter()
            .position(|i| i.status == ItemStatus::Pending)?;

        let video_sampling = self.video_sampling;
        let item = &mut self.items[index];
        item.status = ItemStatus::Processing;
        debug!("Processing {}", item.filename);

        let outcome = match item.kind {
            MediaKind::Image { width, height } => {
                analyze_image(engine, &Frame::new(width, height, Vec::new())).await
            }
            MediaKind::Video { frame_count } => {
                analyze_video(engine, frame_count, video_sampling).await
            }
        };

        match outcome {
            Ok(analysis) => {
                item.status = ItemStatus::Completed;
                item.result = Some(analysis.clone());
                self.results.push(BatchResult {
                    filename: item.filename.clone(),
                    media_type: item.media_type.clone(),
                    size: item.size,
                    analysis,
                });
            }
            Err(e) => {
                warn!("Processing error for {}: {}", item.filename, e);
                item.status = ItemStatus::Failed;
                item.error = Some(e.to_string());
            }
        }

        Some(index)
    }

    /// Process every pending item; returns how many completed
    pub async fn process_all(&mut self, engine: &dyn InferenceEngine) -> Result<usize> {
        if self.pending_count() == 0 {
            return Err(AnalyserError::NothingToProcess);
        }

        let before = self.results.len();
        while self.process_next(engine).await.is_some() {}
        Ok(self.results.len() - before)
    }

    pub fn stats(&self) -> BatchStats {
        let mut distribution = BTreeMap::new();
        for result in &self.results {
            *distribution.entry(result.analysis.result.dominant()).or_insert(0) += 1;
        }

        BatchStats {
            total_files: self.items.len(),
            processed_files: self
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::Completed)
                .count(),
            failed_files: self
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::Failed)
                .count(),
            dominant: most_frequent(self.results.iter().map(|r| r.analysis.result.dominant())),
            distribution,
        }
    }

    /// Save the current results as a batch record
    pub fn save(&self, history: &BatchHistory) -> bool {
        let record = BatchRecord {
            id: format!("batch_{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            file_count: self.items.len(),
            results: self.results.clone(),
        };
        let saved = history.append(record);
        if saved {
            info!("Saved batch with {} results", self.results.len());
        }
        saved
    }

    /// Empty the queue and the results
    pub fn clear(&mut self) {
        self.items.clear();
        self.results.clear();
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new()
    }
}
