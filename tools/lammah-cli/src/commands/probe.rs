//! Show metadata of a video.

use std::path::PathBuf;
use std::sync::Arc;

use lammah_common::config::AppConfig;
use lammah_render_engine::session::OverlayConfig;
use lammah_render_engine::{wait_for_metadata, FfmpegBackend};

pub async fn run(video: PathBuf, json: bool, app_config: &AppConfig) -> anyhow::Result<()> {
    let timeout = OverlayConfig::from(&app_config.overlay).metadata_timeout;
    let backend = FfmpegBackend::new().with_probe_timeout(timeout);
    let metadata = wait_for_metadata(Arc::new(backend), &video, timeout)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", video.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("Video: {}", video.display());
    println!("  Codec: {}", metadata.codec);
    println!("  Resolution: {}x{}", metadata.width, metadata.height);
    println!("  Frame rate: {:.3} fps", metadata.fps);
    println!("  Duration: {:.2}s", metadata.duration_secs);
    match metadata.estimated_frames() {
        Some(frames) if metadata.frame_count.is_some() => println!("  Frames: {frames}"),
        Some(frames) => println!("  Frames: ~{frames} (from duration)"),
        None => println!("  Frames: unknown"),
    }

    Ok(())
}
