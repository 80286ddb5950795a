//! Source video metadata and media handles.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Metadata read from a video before decoding starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Native frame rate.
    pub fps: f64,

    /// Duration in seconds (0.0 when unknown).
    pub duration_secs: f64,

    /// Frame count declared by the container, if any.
    pub frame_count: Option<u64>,

    /// Video codec name.
    pub codec: String,
}

impl VideoMetadata {
    /// Best available frame count: the declared count, else duration × fps.
    pub fn estimated_frames(&self) -> Option<u64> {
        if let Some(count) = self.frame_count.filter(|c| *c > 0) {
            return Some(count);
        }
        if self.duration_secs > 0.0 && self.fps > 0.0 {
            return Some((self.duration_secs * self.fps).round().max(1.0) as u64);
        }
        None
    }

    /// Whether frames of this video can be drawn onto a surface.
    pub fn has_drawable_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// What a [`MediaRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A re-encoded video with the skeletal overlay burned in.
    Overlay,
    /// The unmodified input video.
    Original,
}

/// A dereferenceable handle to a playable video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Location of the media on disk.
    pub path: PathBuf,

    /// What the handle references.
    pub kind: MediaKind,

    /// MIME type of the media.
    pub mime_type: String,
}

impl MediaRef {
    /// Handle to a freshly encoded overlay video.
    pub fn overlay(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Overlay,
            mime_type: mime_type.into(),
        }
    }

    /// Handle referencing the original input unmodified.
    pub fn original(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_type_for_path(&path).to_string();
        Self {
            path,
            kind: MediaKind::Original,
            mime_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the referenced media.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// File name suggested when the media is downloaded.
    pub fn download_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "processed_motion_analysis".to_string())
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps: 25.0,
            duration_secs: 10.0,
            frame_count: None,
            codec: "h264".to_string(),
        }
    }

    #[test]
    fn test_estimated_frames_prefers_declared_count() {
        let mut meta = metadata();
        assert_eq!(meta.estimated_frames(), Some(250));

        meta.frame_count = Some(248);
        assert_eq!(meta.estimated_frames(), Some(248));

        meta.frame_count = Some(0);
        meta.duration_secs = 0.0;
        assert_eq!(meta.estimated_frames(), None);
    }

    #[test]
    fn test_original_ref_infers_mime() {
        let media = MediaRef::original("/videos/jump.MOV");
        assert_eq!(media.kind, MediaKind::Original);
        assert_eq!(media.mime_type, "video/quicktime");
        assert_eq!(media.download_name(), "jump.MOV");
    }

    #[test]
    fn test_drawable_dimensions() {
        let mut meta = metadata();
        assert!(meta.has_drawable_dimensions());
        meta.height = 0;
        assert!(!meta.has_drawable_dimensions());
    }
}
