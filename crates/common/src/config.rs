//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metric sampling defaults.
    #[serde(default)]
    pub analysis: AnalysisDefaults,

    /// Overlay rendering and encoding defaults.
    #[serde(default)]
    pub overlay: OverlayDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default metric sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    /// Lower bound of the estimated frame count (inclusive).
    pub min_frames: u64,

    /// Upper bound of the estimated frame count (exclusive).
    pub max_frames: u64,

    /// Pause between samples so progress is observable (milliseconds).
    pub frame_delay_ms: u64,

    /// Seed for the run's random generator. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// How the number of sampled frames is chosen.
    pub frame_count: FrameCountMode,

    /// Largest probed frame count that is trusted. Larger counts fall back
    /// to the estimate.
    pub max_probed_frames: u64,
}

/// Frame-count selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameCountMode {
    /// Bounded pseudo-random estimate.
    #[default]
    Estimated,
    /// Frame count read from the input video, estimate as fallback.
    Probed,
}

/// Default overlay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayDefaults {
    /// Capture frame-rate hint for the encoded overlay.
    pub fps: u32,

    /// Wall-clock encode budget in seconds. `None` renders the full source.
    pub budget_secs: Option<f64>,

    /// Output container.
    pub format: OverlayFormatName,

    /// Target video bitrate.
    pub video_bitrate_kbps: u32,

    /// How long to wait for the source to become decodable.
    pub metadata_timeout_secs: f64,

    /// Where overlay videos are written. `None` uses the input's directory.
    pub output_dir: Option<PathBuf>,
}

/// Overlay container name as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayFormatName {
    #[default]
    Webm,
    Mp4,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "lammah=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            min_frames: 100,
            max_frames: 300,
            frame_delay_ms: 50,
            seed: None,
            frame_count: FrameCountMode::Estimated,
            max_probed_frames: 18_000,
        }
    }
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            budget_secs: Some(3.0),
            format: OverlayFormatName::Webm,
            video_bitrate_kbps: 2500,
            metadata_timeout_secs: 10.0,
            output_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("lammah").join("config.json")
}
