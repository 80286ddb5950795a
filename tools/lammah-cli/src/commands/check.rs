//! Check system capabilities.

use lammah_common::config::config_file_path;
use lammah_render_engine::ffmpeg::command_exists;
use lammah_render_engine::{FfmpegBackend, MediaBackend};

pub fn run() -> anyhow::Result<()> {
    println!("Lammah System Check");
    println!("{}", "=".repeat(50));

    let backend = FfmpegBackend::new();
    let mut all_ok = true;
    for binary in [backend.ffmpeg_bin(), backend.ffprobe_bin()] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found on PATH");
            all_ok = false;
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] No config at {} (using defaults)", config_path.display());
    }

    println!();
    if all_ok && backend.is_available() {
        println!("ffmpeg is available. Overlay videos will be rendered.");
    } else {
        println!("ffmpeg is missing. Runs will fall back to the original video.");
    }

    Ok(())
}
