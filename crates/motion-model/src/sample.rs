//! Per-frame motion metric records.

use serde::{Deserialize, Serialize};

/// Zero-based index of a sampled frame.
pub type FrameIndex = u64;

/// One record per processed frame.
///
/// Created once for its frame index and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Zero-based frame index, increasing by one per record.
    pub frame_index: FrameIndex,

    /// Overall motion magnitude (normalized).
    pub motion: f64,

    /// How close the hands are to each other (normalized).
    pub arm_closure: f64,

    /// Shoulder line slope in degrees.
    pub shoulder_slope: f64,

    /// Distance between the feet (normalized).
    pub foot_distance: f64,

    /// Hand speed (normalized).
    pub hand_velocity: f64,
}

/// The metric fields of a [`MotionSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Motion,
    ArmClosure,
    ShoulderSlope,
    FootDistance,
    HandVelocity,
}

impl Metric {
    /// All metrics in export column order.
    pub const ALL: [Metric; 5] = [
        Metric::Motion,
        Metric::ArmClosure,
        Metric::ShoulderSlope,
        Metric::FootDistance,
        Metric::HandVelocity,
    ];

    /// Column name used in CSV headers.
    pub fn column_name(self) -> &'static str {
        match self {
            Metric::Motion => "Motion",
            Metric::ArmClosure => "ArmClosure",
            Metric::ShoulderSlope => "ShoulderSlope",
            Metric::FootDistance => "FootDistance",
            Metric::HandVelocity => "HandVelocity",
        }
    }

    /// Unit suffix shown next to display values.
    pub fn unit_suffix(self) -> &'static str {
        match self {
            Metric::ShoulderSlope => "°",
            _ => "",
        }
    }

    /// Decimal places used when a value is displayed.
    pub fn display_precision(self) -> usize {
        match self {
            Metric::ShoulderSlope => 1,
            _ => 4,
        }
    }

    /// Read this metric from a sample.
    pub fn value(self, sample: &MotionSample) -> f64 {
        match self {
            Metric::Motion => sample.motion,
            Metric::ArmClosure => sample.arm_closure,
            Metric::ShoulderSlope => sample.shoulder_slope,
            Metric::FootDistance => sample.foot_distance,
            Metric::HandVelocity => sample.hand_velocity,
        }
    }

    /// Chart series for this metric: `(frame_index, value)` in frame order.
    pub fn series(self, samples: &[MotionSample]) -> Vec<(FrameIndex, f64)> {
        samples
            .iter()
            .map(|s| (s.frame_index, self.value(s)))
            .collect()
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}
