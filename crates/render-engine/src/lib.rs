//! Lammah Render Engine
//!
//! Burns a skeletal overlay into a copy of the source video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ──► probe (metadata wait)
//!                    │
//!                    ▼
//!               FrameDecoder ──► Surface ◄── PoseEstimator landmarks
//!                                   │
//!                                   ├── points, then connections
//!                                   ▼
//!                              EncoderSink (VP9 / H.264)
//!                                   │  chunks in arrival order
//!                                   ▼
//!                      input_motion_overlay.webm
//! ```

pub mod backend;
pub mod ffmpeg;
pub mod overlay;
pub mod session;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::*;
pub use ffmpeg::FfmpegBackend;
pub use overlay::{OverlayRenderer, OverlayStyle};
pub use session::*;
pub use surface::Surface;
