//! Lammah Analysis Engine
//!
//! Runs one video end to end:
//!
//! ```text
//! runAnalysis(video)
//!   │
//!   ├── Sampling     MetricSampler, one MotionSample per frame, progress after each
//!   │
//!   ├── Overlaying   render_overlay: probe → decode → draw skeleton → encode
//!   │        │
//!   │        └── failure ──► original video, degraded = true
//!   ▼
//! AnalysisResult
//! ```

pub mod pipeline;

pub use pipeline::*;
