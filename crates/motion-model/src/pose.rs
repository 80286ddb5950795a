//! Skeleton topology shared by pose estimators and the overlay renderer.
//!
//! Estimators and the renderer agree on landmark ordering through
//! [`LandmarkId`] and [`POSE_CONNECTIONS`], never through shared state.

use serde::{Deserialize, Serialize};

/// Number of landmarks in a pose.
pub const LANDMARK_COUNT: usize = 13;

/// A 2D point in drawing-surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Pixel coordinates rounded to the nearest integer.
    pub fn to_pixel(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// Semantic identity of each landmark, in pose order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkId {
    Head = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftElbow = 3,
    RightElbow = 4,
    LeftWrist = 5,
    RightWrist = 6,
    LeftHip = 7,
    RightHip = 8,
    LeftKnee = 9,
    RightKnee = 10,
    LeftAnkle = 11,
    RightAnkle = 12,
}

impl LandmarkId {
    /// All landmarks in pose order.
    pub const ALL: [LandmarkId; LANDMARK_COUNT] = [
        LandmarkId::Head,
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
        LandmarkId::LeftElbow,
        LandmarkId::RightElbow,
        LandmarkId::LeftWrist,
        LandmarkId::RightWrist,
        LandmarkId::LeftHip,
        LandmarkId::RightHip,
        LandmarkId::LeftKnee,
        LandmarkId::RightKnee,
        LandmarkId::LeftAnkle,
        LandmarkId::RightAnkle,
    ];

    /// Position of this landmark in a pose.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Skeletal connections as index pairs into a pose.
pub const POSE_CONNECTIONS: [(usize, usize); 14] = [
    // head to shoulders
    (0, 1),
    (0, 2),
    // shoulder line
    (1, 2),
    // upper arms
    (1, 3),
    (2, 4),
    // forearms
    (3, 5),
    (4, 6),
    // torso sides
    (1, 7),
    (2, 8),
    // hip line
    (7, 8),
    // thighs
    (7, 9),
    (8, 10),
    // shins
    (9, 11),
    (10, 12),
];
