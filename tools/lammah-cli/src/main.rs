//! Lammah CLI - Command-line interface for motion analysis.
//!
//! Usage:
//!   lammah analyze <VIDEO>     Sample motion metrics and render the pose overlay
//!   lammah probe <VIDEO>       Show video metadata
//!   lammah check               Check that ffmpeg and ffprobe are usable

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use lammah_common::config::{AppConfig, LoggingConfig};

mod commands;
mod input;

#[derive(Parser)]
#[command(
    name = "lammah",
    about = "Motion analysis with a skeletal overlay video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Webm,
    Mp4,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a video: sample motion metrics and render the overlay
    Analyze {
        /// Path to the input video
        video: PathBuf,

        /// Directory for the overlay video (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Overlay encode budget in seconds
        #[arg(
            long,
            conflicts_with = "full_length",
            value_parser = commands::analyze::parse_budget_secs
        )]
        budget_secs: Option<f64>,

        /// Render the overlay for the whole video
        #[arg(long)]
        full_length: bool,

        /// Capture frame rate of the overlay
        #[arg(long)]
        fps: Option<u32>,

        /// Overlay container
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Sample the video's own frame count instead of an estimate
        #[arg(long)]
        probe_frames: bool,

        /// Write samples as CSV to this path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Number of sample rows to preview
        #[arg(long, default_value = "10")]
        rows: usize,
    },

    /// Show video metadata
    Probe {
        /// Path to the video
        video: PathBuf,

        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let logging = if cli.verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        }
    } else {
        config.logging.clone()
    };
    lammah_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Analyze {
            video,
            output_dir,
            seed,
            budget_secs,
            full_length,
            fps,
            format,
            probe_frames,
            csv,
            json,
            rows,
        } => {
            commands::analyze::run(
                commands::analyze::AnalyzeArgs {
                    video,
                    output_dir,
                    seed,
                    budget_secs,
                    full_length,
                    fps,
                    format: format.map(|f| match f {
                        FormatArg::Webm => lammah_render_engine::OverlayFormat::Webm,
                        FormatArg::Mp4 => lammah_render_engine::OverlayFormat::Mp4,
                    }),
                    probe_frames,
                    csv,
                    json,
                    rows,
                },
                &config,
            )
            .await
        }
        Commands::Probe { video, json } => commands::probe::run(video, json, &config).await,
        Commands::Check => commands::check::run(),
    }
}
