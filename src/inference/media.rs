//! Image and video analysis on top of an [`InferenceEngine`]
//!
//! Videos are not decoded: a video is summarized by sampling a handful of
//! synthetic frames and averaging their scores per label.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::inference::{Frame, InferenceEngine};
use crate::types::{rounded_mean, Emotion, InferenceResult, LabelScores};

/// Most frames inferred for one video
pub const MAX_VIDEO_SAMPLES: u32 = 5;

/// Result of analyzing one uploaded image or video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAnalysis {
    #[serde(flatten)]
    pub result: InferenceResult,
    /// Frames in the source (1 for images)
    pub frames: u32,
    /// Frames selected by the sampling rate (videos only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampled_frames: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Analyze a single image frame
pub async fn analyze_image(engine: &dyn InferenceEngine, frame: &Frame) -> Result<MediaAnalysis> {
    let result = engine.infer(frame).await?;
    Ok(MediaAnalysis {
        result,
        frames: 1,
        sampled_frames: None,
        width: Some(frame.width),
        height: Some(frame.height),
    })
}

/// Analyze a video of `frame_count` frames sampled every `sampling_rate` frames
///
/// At most [`MAX_VIDEO_SAMPLES`] and at least one frame is inferred. The
/// per-label scores are averaged (half-up) and the dominant label is
/// recomputed from the averages.
pub async fn analyze_video(
    engine: &dyn InferenceEngine,
    frame_count: u32,
    sampling_rate: u32,
) -> Result<MediaAnalysis> {
    let sampled = frame_count / sampling_rate.max(1);
    let to_infer = sampled.clamp(1, MAX_VIDEO_SAMPLES);

    let mut results = Vec::with_capacity(to_infer as usize);
    for _ in 0..to_infer {
        results.push(engine.infer(&Frame::empty()).await?);
    }

    Ok(MediaAnalysis {
        result: InferenceResult::new(average_scores(&results)),
        frames: frame_count,
        sampled_frames: Some(sampled),
        width: None,
        height: None,
    })
}

/// Per-label half-up mean over several results
pub fn average_scores(results: &[InferenceResult]) -> LabelScores {
    let mut averages = [0u32; 7];
    for label in Emotion::ALL {
        let sum: u64 = results
            .iter()
            .map(|r| r.emotions().get(label) as u64)
            .sum();
        averages[label.index()] = rounded_mean(sum, results.len());
    }
    LabelScores::saturating(averages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalyserError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        results: Mutex<Vec<InferenceResult>>,
    }

    #[async_trait]
    impl InferenceEngine for Scripted {
        async fn infer(&self, _frame: &Frame) -> Result<InferenceResult> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AnalyserError::InferenceFailed("script exhausted".to_string()))
        }
    }

    fn scripted(results: Vec<InferenceResult>) -> Scripted {
        Scripted {
            results: Mutex::new(results),
        }
    }

    #[tokio::test]
    async fn test_image_analysis_carries_dimensions() {
        let engine = scripted(vec![
            InferenceResult::from_pairs([(Emotion::Happy, 70)]).unwrap()
        ]);
        let analysis = analyze_image(&engine, &Frame::new(320, 240, Vec::new()))
            .await
            .unwrap();

        assert_eq!(analysis.frames, 1);
        assert_eq!(analysis.width, Some(320));
        assert_eq!(analysis.result.dominant(), Emotion::Happy);
    }

    #[tokio::test]
    async fn test_video_averages_sampled_frames() {
        let engine = scripted(vec![
            InferenceResult::from_pairs([(Emotion::Sad, 60), (Emotion::Happy, 20)]).unwrap(),
            InferenceResult::from_pairs([(Emotion::Sad, 10), (Emotion::Happy, 41)]).unwrap(),
        ]);

        // 20 frames every 10th frame: 2 samples
        let analysis = analyze_video(&engine, 20, 10).await.unwrap();

        assert_eq!(analysis.sampled_frames, Some(2));
        assert_eq!(analysis.result.emotions().get(Emotion::Sad), 35);
        assert_eq!(analysis.result.emotions().get(Emotion::Happy), 31);
        assert_eq!(analysis.result.dominant(), Emotion::Sad);
        assert_eq!(analysis.result.confidence(), 35);
    }

    #[tokio::test]
    async fn test_short_video_still_infers_one_frame() {
        let engine = scripted(vec![
            InferenceResult::from_pairs([(Emotion::Fear, 50)]).unwrap()
        ]);
        let analysis = analyze_video(&engine, 3, 10).await.unwrap();

        assert_eq!(analysis.sampled_frames, Some(0));
        assert_eq!(analysis.result.dominant(), Emotion::Fear);
    }

    #[tokio::test]
    async fn test_video_caps_samples() {
        let results = (0..MAX_VIDEO_SAMPLES)
            .map(|_| InferenceResult::from_pairs([(Emotion::Angry, 40)]).unwrap())
            .collect();
        let engine = scripted(results);

        // 100 sampled frames, only 5 inferred; a sixth call would fail
        let analysis = analyze_video(&engine, 1000, 10).await.unwrap();
        assert_eq!(analysis.sampled_frames, Some(100));
        assert_eq!(analysis.result.confidence(), 40);
    }
}
