//! Analyze a video: sample metrics, render the overlay, report results.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use lammah_analysis_engine::{AnalysisPipeline, FrameCountPolicy, PipelineConfig, ProgressCallback};
use lammah_common::cancel::CancelToken;
use lammah_common::config::AppConfig;
use lammah_common::error::LammahError;
use lammah_motion_model::result::AnalysisProgress;
use lammah_motion_model::sample::Metric;
use lammah_motion_model::table::{display_row, write_csv, FRAME_COLUMN};
use lammah_render_engine::OverlayFormat;

use crate::input::screen_input;

pub struct AnalyzeArgs {
    pub video: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub budget_secs: Option<f64>,
    pub full_length: bool,
    pub fps: Option<u32>,
    pub format: Option<OverlayFormat>,
    pub probe_frames: bool,
    pub csv: Option<PathBuf>,
    pub json: bool,
    pub rows: usize,
}

pub async fn run(args: AnalyzeArgs, app_config: &AppConfig) -> anyhow::Result<()> {
    let screening = screen_input(&args.video)?;
    for warning in &screening.warnings {
        tracing::warn!("{warning}");
        eprintln!("Warning: {warning}");
    }

    let config = pipeline_config(&args, app_config);

    eprintln!("Analyzing: {}", args.video.display());
    eprintln!("  Overlay format: {:?}", config.overlay.format);
    match config.overlay.budget {
        Some(budget) => eprintln!("  Encode budget: {:.1}s", budget.as_secs_f64()),
        None => eprintln!("  Encode budget: full length"),
    }

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            trigger.cancel();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: AnalysisProgress| {
        eprint!(
            "\r  Progress: {:.1}% ({}/{} frames)  ",
            p.percent, p.frames_done, p.total_frames
        );
        let _ = std::io::stderr().flush();
    });

    let mut pipeline = AnalysisPipeline::with_ffmpeg(config);
    let result = match pipeline
        .run_analysis(&args.video, Some(progress_cb), &cancel)
        .await
    {
        Ok(result) => result,
        Err(LammahError::Cancelled) => {
            eprintln!("\nAnalysis cancelled.");
            return Ok(());
        }
        Err(e) => return Err(anyhow::anyhow!("Analysis failed: {e}")),
    };
    eprintln!();

    if result.degraded {
        eprintln!(
            "Overlay unavailable ({}); using the original video.",
            result.failure.as_deref().unwrap_or("unknown error")
        );
    }
    eprintln!(
        "Video: {} ({})",
        result.overlay_video.path.display(),
        result.overlay_video.mime_type
    );

    if let Some(csv_path) = &args.csv {
        write_csv(csv_path, &result.samples)?;
        eprintln!("CSV written: {}", csv_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let summary = result.summary();
    println!("Summary:");
    println!("  Total frames: {}", summary.total_frames);
    println!("  Mean motion: {:.4}", summary.mean_motion);
    println!("  Mean shoulder slope: {:.1}°", summary.mean_shoulder_slope);
    println!("  Mean hand velocity: {:.4}", summary.mean_hand_velocity);

    if args.rows > 0 {
        println!();
        print_rows(&result.samples[..args.rows.min(result.samples.len())]);
        if result.samples.len() > args.rows {
            println!("  ... {} more rows", result.samples.len() - args.rows);
        }
    }

    Ok(())
}

fn pipeline_config(args: &AnalyzeArgs, app_config: &AppConfig) -> PipelineConfig {
    let mut config = PipelineConfig::from(app_config);

    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.probe_frames {
        let (min, max) = match config.frame_count {
            FrameCountPolicy::Estimated { min, max } | FrameCountPolicy::Probed { min, max } => {
                (min, max)
            }
        };
        config.frame_count = FrameCountPolicy::Probed { min, max };
    }
    if let Some(dir) = &args.output_dir {
        config.overlay.output_dir = Some(dir.clone());
    }
    if let Some(fps) = args.fps {
        config.overlay.fps = fps.max(1);
    }
    if let Some(format) = args.format {
        config.overlay.format = format;
    }
    if args.full_length {
        config.overlay.budget = None;
    } else if let Some(secs) = args.budget_secs {
        config.overlay.budget = Some(Duration::from_secs_f64(secs));
    }

    config
}

/// Parse `--budget-secs`: a finite number of seconds greater than zero.
pub fn parse_budget_secs(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!(
            "budget must be greater than zero seconds (got {raw}); use --full-length for no budget"
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("budget of {raw}s is too large"))?;
    Ok(secs)
}

fn print_rows(samples: &[lammah_motion_model::sample::MotionSample]) {
    let header: Vec<&str> = std::iter::once(FRAME_COLUMN)
        .chain(Metric::ALL.iter().map(|m| m.column_name()))
        .collect();
    println!(
        "{}",
        header
            .iter()
            .map(|h| format!("{h:>14}"))
            .collect::<String>()
    );
    for sample in samples {
        println!(
            "{}",
            display_row(sample)
                .iter()
                .map(|cell| format!("{cell:>14}"))
                .collect::<String>()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AnalyzeArgs {
        AnalyzeArgs {
            video: PathBuf::from("clip.mp4"),
            output_dir: None,
            seed: None,
            budget_secs: None,
            full_length: false,
            fps: None,
            format: None,
            probe_frames: false,
            csv: None,
            json: false,
            rows: 10,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let app = AppConfig::default();
        let config = pipeline_config(
            &AnalyzeArgs {
                seed: Some(9),
                budget_secs: Some(1.5),
                fps: Some(0),
                format: Some(OverlayFormat::Mp4),
                probe_frames: true,
                ..args()
            },
            &app,
        );
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.overlay.budget, Some(Duration::from_millis(1500)));
        assert_eq!(config.overlay.fps, 1);
        assert_eq!(config.overlay.format, OverlayFormat::Mp4);
        assert_eq!(
            config.frame_count,
            FrameCountPolicy::Probed { min: 100, max: 300 }
        );
    }

    #[test]
    fn test_parse_budget_secs() {
        assert_eq!(parse_budget_secs("2.5"), Ok(2.5));
        assert!(parse_budget_secs("0").is_err());
        assert!(parse_budget_secs("-1").is_err());
        assert!(parse_budget_secs("NaN").is_err());
        assert!(parse_budget_secs("three").is_err());
        assert!(parse_budget_secs("1e300").is_err());
    }

    #[test]
    fn test_full_length_clears_budget() {
        let config = pipeline_config(
            &AnalyzeArgs {
                full_length: true,
                ..args()
            },
            &AppConfig::default(),
        );
        assert_eq!(config.overlay.budget, None);

        let defaults = pipeline_config(&args(), &AppConfig::default());
        assert_eq!(defaults.overlay.budget, Some(Duration::from_secs(3)));
    }
}
