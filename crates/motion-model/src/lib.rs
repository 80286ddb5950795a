//! Lammah Motion Model
//!
//! Defines the core data contracts of a motion analysis run:
//! - **Samples:** One `MotionSample` per processed frame, in frame order
//! - **Pose:** The fixed 13-landmark skeleton and its 14 connections
//! - **Media:** Probed video metadata and dereferenceable media handles
//! - **Result:** The terminal `AnalysisResult` of a run, plus summaries
//! - **Table:** CSV export and display formatting of samples
//!
//! Landmark coordinates are in drawing-surface pixel space.

pub mod media;
pub mod pose;
pub mod result;
pub mod sample;
pub mod table;

pub use media::*;
pub use pose::*;
pub use result::*;
pub use sample::*;
pub use table::*;
