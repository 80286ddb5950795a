//! Lammah Common Utilities
//!
//! Shared infrastructure for all Lammah crates:
//! - Error types and result aliases
//! - Session clock and frame-time conversions
//! - Cooperative cancellation token
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::*;
pub use clock::*;
pub use config::*;
pub use error::*;
