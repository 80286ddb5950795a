//! Progress reports and terminal results of an analysis run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::media::{MediaKind, MediaRef};
use crate::sample::{Metric, MotionSample};

/// Progress report emitted after each sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    /// Completion percentage in `[0.0, 100.0]`.
    pub percent: f64,

    /// Frames sampled so far.
    pub frames_done: u64,

    /// Total frames in this run.
    pub total_frames: u64,
}

impl AnalysisProgress {
    /// Build a report for `frames_done` of `total_frames`.
    ///
    /// The percentage is exactly `100.0` when both counts are equal.
    pub fn new(frames_done: u64, total_frames: u64) -> Self {
        let percent = if total_frames == 0 {
            100.0
        } else {
            frames_done as f64 * 100.0 / total_frames as f64
        };
        Self {
            percent,
            frames_done,
            total_frames,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.frames_done >= self.total_frames
    }
}

/// Terminal output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The input video the run was started with.
    pub source: PathBuf,

    /// Frame count chosen for this run.
    pub total_frames: u64,

    /// One sample per frame, indexed by `frame_index`.
    pub samples: Vec<MotionSample>,

    /// Overlay video, or the original input when overlay failed.
    pub overlay_video: MediaRef,

    /// Whether the overlay phase failed and the original was substituted.
    pub degraded: bool,

    /// Why the overlay phase failed, when it did.
    pub failure: Option<String>,

    /// Completion timestamp (RFC 3339).
    pub completed_at: String,
}

impl AnalysisResult {
    /// Result whose overlay video was produced successfully.
    pub fn with_overlay(
        source: impl Into<PathBuf>,
        samples: Vec<MotionSample>,
        overlay_video: MediaRef,
    ) -> Self {
        Self {
            source: source.into(),
            total_frames: samples.len() as u64,
            samples,
            overlay_video,
            degraded: false,
            failure: None,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Result that falls back to the unmodified input video.
    pub fn with_fallback(
        source: impl Into<PathBuf>,
        samples: Vec<MotionSample>,
        failure: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            overlay_video: MediaRef::original(source.clone()),
            source,
            total_frames: samples.len() as u64,
            samples,
            degraded: true,
            failure: Some(failure.into()),
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether the overlay handle points at a re-encoded overlay.
    pub fn has_overlay(&self) -> bool {
        self.overlay_video.kind == MediaKind::Overlay
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary::from_samples(&self.samples)
    }
}

/// Headline statistics shown alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_frames: u64,
    pub mean_motion: f64,
    pub mean_shoulder_slope: f64,
    pub mean_hand_velocity: f64,
}

impl AnalysisSummary {
    pub fn from_samples(samples: &[MotionSample]) -> Self {
        Self {
            total_frames: samples.len() as u64,
            mean_motion: mean(samples, Metric::Motion),
            mean_shoulder_slope: mean(samples, Metric::ShoulderSlope),
            mean_hand_velocity: mean(samples, Metric::HandVelocity),
        }
    }
}

fn mean(samples: &[MotionSample], metric: Metric) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| metric.value(s)).sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<MotionSample> {
        (0..4)
            .map(|i| MotionSample {
                frame_index: i,
                motion: 0.1 * i as f64,
                arm_closure: 0.5,
                shoulder_slope: 80.0 + 2.0 * i as f64,
                foot_distance: 0.2,
                hand_velocity: 0.2,
            })
            .collect()
    }

    #[test]
    fn test_progress_reaches_exactly_one_hundred() {
        let total = 257;
        let last = AnalysisProgress::new(total, total);
        assert_eq!(last.percent, 100.0);
        assert!(last.is_complete());

        let first = AnalysisProgress::new(1, total);
        assert!(first.percent > 0.0 && first.percent < 1.0);
        assert!(!first.is_complete());
    }

    #[test]
    fn test_summary_means() {
        let summary = AnalysisSummary::from_samples(&samples());
        assert_eq!(summary.total_frames, 4);
        assert!((summary.mean_motion - 0.15).abs() < 1e-12);
        assert!((summary.mean_shoulder_slope - 83.0).abs() < 1e-12);
        assert!((summary.mean_hand_velocity - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_summary_of_empty_run_is_zero() {
        let summary = AnalysisSummary::from_samples(&[]);
        assert_eq!(summary.total_frames, 0);
        assert_eq!(summary.mean_motion, 0.0);
    }

    #[test]
    fn test_fallback_references_original() {
        let result = AnalysisResult::with_fallback("/videos/run.mp4", samples(), "encoder missing");
        assert!(result.degraded);
        assert!(!result.has_overlay());
        assert_eq!(result.overlay_video.path, PathBuf::from("/videos/run.mp4"));
        assert_eq!(result.total_frames, 4);
        assert_eq!(result.failure.as_deref(), Some("encoder missing"));
    }

    #[test]
    fn test_result_serializes() {
        let overlay = MediaRef::overlay("/out/run_motion_overlay.webm", "video/webm");
        let result = AnalysisResult::with_overlay("/videos/run.mp4", samples(), overlay);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["degraded"], false);
        assert_eq!(json["overlay_video"]["kind"], "overlay");
        assert_eq!(json["samples"].as_array().unwrap().len(), 4);
    }
}
