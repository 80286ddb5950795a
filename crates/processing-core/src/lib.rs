//! Lammah Processing Core
//!
//! Produces the data an analysis run is made of:
//! - **Metric Sampler:** One motion sample per frame, with paced progress reports
//! - **Pose Estimation:** Skeleton landmarks for a timestamp and surface size
//!
//! Apart from the sampler's pacing yields, this crate is pure computation:
//! no I/O, no media dependencies.

pub mod metric_sampler;
pub mod pose;

pub use metric_sampler::{MetricSampler, SamplerConfig};
pub use pose::{PoseEstimator, SwayPoseEstimator};
