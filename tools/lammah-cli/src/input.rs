//! Input screening before a run starts.

use std::path::Path;

/// Video extensions accepted for analysis.
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["mp4", "avi", "mov", "mkv", "webm", "m4v"];

/// Files above this size get an advisory warning. Nothing is rejected for size.
pub const ADVISORY_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Outcome of screening an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    pub size_bytes: u64,
    pub warnings: Vec<String>,
}

/// Check that `path` is an existing video file with an accepted extension.
pub fn screen_input(path: &Path) -> anyhow::Result<Screening> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        anyhow::bail!(
            "{} does not look like a video file. Accepted: {}",
            path.display(),
            ACCEPTED_EXTENSIONS.join(", ")
        );
    }

    let mut warnings = Vec::new();
    if metadata.len() > ADVISORY_SIZE_BYTES {
        warnings.push(format!(
            "{} is {:.0} MB; files over 100 MB may take a long time to process",
            path.display(),
            metadata.len() as f64 / (1024.0 * 1024.0)
        ));
    }

    Ok(Screening {
        size_bytes: metadata.len(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lammah-cli-input-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_accepts_video_extensions_case_insensitively() {
        let path = scratch("clip.MP4", b"data");
        let screening = screen_input(&path).unwrap();
        assert_eq!(screening.size_bytes, 4);
        assert!(screening.warnings.is_empty());
    }

    #[test]
    fn test_rejects_non_video_extension() {
        let path = scratch("notes.txt", b"data");
        assert!(screen_input(&path).is_err());
    }

    #[test]
    fn test_rejects_missing_file() {
        assert!(screen_input(Path::new("/nonexistent/lammah/clip.mp4")).is_err());
    }
}
