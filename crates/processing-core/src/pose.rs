//! Pose landmark estimation.
//!
//! [`PoseEstimator`] is the seam between the overlay and whatever produces
//! joint positions. The shipped [`SwayPoseEstimator`] does not look at pixels:
//! it places a fixed 13-point skeleton around the surface center and moves it
//! sideways as one rigid body.

use lammah_motion_model::pose::{Landmark, LANDMARK_COUNT};

/// Produces skeleton landmarks for a frame.
///
/// Implementations must return landmarks in [`LandmarkId`] order so they line
/// up with [`POSE_CONNECTIONS`].
///
/// [`LandmarkId`]: lammah_motion_model::pose::LandmarkId
/// [`POSE_CONNECTIONS`]: lammah_motion_model::pose::POSE_CONNECTIONS
pub trait PoseEstimator: Send + Sync {
    /// Estimator name for logs.
    fn name(&self) -> &str;

    /// Landmarks at `timestamp_secs` on a `width` × `height` surface.
    fn landmarks_at(&self, timestamp_secs: f64, width: u32, height: u32) -> Vec<Landmark>;
}

/// Offsets of each landmark from the surface center, in pixels.
const SKELETON_OFFSETS: [(f64, f64); LANDMARK_COUNT] = [
    (0.0, -100.0),  // head
    (-50.0, -50.0), // left shoulder
    (50.0, -50.0),  // right shoulder
    (-80.0, 0.0),   // left elbow
    (80.0, 0.0),    // right elbow
    (-100.0, 30.0), // left wrist
    (100.0, 30.0),  // right wrist
    (-30.0, 80.0),  // left hip
    (30.0, 80.0),   // right hip
    (-35.0, 150.0), // left knee
    (35.0, 150.0),  // right knee
    (-40.0, 200.0), // left ankle
    (40.0, 200.0),  // right ankle
];

/// Placeholder estimator: a rigid skeleton swaying horizontally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwayPoseEstimator {
    /// Peak horizontal displacement in pixels.
    pub amplitude_px: f64,
    /// Sway speed in radians per second.
    pub angular_speed: f64,
}

impl Default for SwayPoseEstimator {
    fn default() -> Self {
        Self {
            amplitude_px: 20.0,
            angular_speed: 1.0,
        }
    }
}

impl SwayPoseEstimator {
    /// Horizontal offset applied to every landmark at `timestamp_secs`.
    pub fn sway(&self, timestamp_secs: f64) -> f64 {
        (timestamp_secs * self.angular_speed).sin() * self.amplitude_px
    }
}

impl PoseEstimator for SwayPoseEstimator {
    fn name(&self) -> &str {
        "sway"
    }

    fn landmarks_at(&self, timestamp_secs: f64, width: u32, height: u32) -> Vec<Landmark> {
        let center_x = width as f64 / 2.0;
        let center_y = height as f64 / 2.0;
        let sway = self.sway(timestamp_secs);

        SKELETON_OFFSETS
            .iter()
            .map(|(dx, dy)| Landmark::new(center_x + dx + sway, center_y + dy))
            .collect()
    }
}
