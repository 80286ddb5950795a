//! Clock and timing utilities for the overlay session.
//!
//! A session clock is anchored to the moment an encode session starts.
//! It is used for:
//! - Enforcing the wall-clock encode budget
//! - Converting capture frame indices to source timestamps

use std::time::Duration;

use tokio::time::Instant;

/// A session clock that provides monotonic elapsed time relative to
/// a fixed epoch (the moment the session started).
///
/// Backed by `tokio::time::Instant` so paused-time tests observe the
/// same clock the render loop does.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new session clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since the session started.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Whether the given budget has been used up. `None` never expires.
    pub fn budget_exhausted(&self, budget: Option<Duration>) -> bool {
        match budget {
            Some(budget) => self.elapsed() >= budget,
            None => false,
        }
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Source timestamp in seconds of a frame index at the given rate.
    pub fn frame_to_secs(frame_index: u64, fps: f64) -> f64 {
        if fps <= 0.0 {
            return 0.0;
        }
        frame_index as f64 / fps
    }

    /// Interval between frames at the given rate.
    pub fn frame_interval(fps: u32) -> Duration {
        Duration::from_nanos(1_000_000_000 / fps.max(1) as u64)
    }
}
