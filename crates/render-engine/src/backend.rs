//! Media backend seams: probing, frame decode, and chunked encode.

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use lammah_common::config::OverlayFormatName;
use lammah_common::error::LammahResult;
use lammah_motion_model::media::VideoMetadata;

/// Container and codec of the overlay video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayFormat {
    /// WebM / VP9.
    #[default]
    Webm,
    /// Fragmented MP4 / H.264.
    Mp4,
}

impl OverlayFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OverlayFormat::Webm => "webm",
            OverlayFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OverlayFormat::Webm => "video/webm",
            OverlayFormat::Mp4 => "video/mp4",
        }
    }
}

impl From<OverlayFormatName> for OverlayFormat {
    fn from(name: OverlayFormatName) -> Self {
        match name {
            OverlayFormatName::Webm => OverlayFormat::Webm,
            OverlayFormatName::Mp4 => OverlayFormat::Mp4,
        }
    }
}

/// Parameters for opening an encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    /// Frame rate the captured stream is tagged with.
    pub fps: u32,
    pub format: OverlayFormat,
    pub video_bitrate_kbps: u32,
}

/// Source of decoded RGB frames, in presentation order.
pub trait FrameDecoder: Send {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> LammahResult<Option<RgbImage>>;

    /// Stop decoding and release the source. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Live encoder that turns surface captures into encoded chunks.
pub trait EncoderSink: Send {
    /// Submit one captured frame.
    fn write_frame(&mut self, frame: &RgbImage) -> LammahResult<()>;

    /// Signal end of stream and wait for finalization.
    ///
    /// Returns the encoded chunks in arrival order.
    fn finish(&mut self) -> LammahResult<Vec<Vec<u8>>>;

    /// Stop without finalizing, discarding output. Idempotent.
    fn abort(&mut self);

    fn is_active(&self) -> bool;
}

/// Factory for decoders and encoders.
pub trait MediaBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is usable on the system.
    fn is_available(&self) -> bool;

    /// Read metadata without decoding frames.
    fn probe(&self, path: &Path) -> LammahResult<VideoMetadata>;

    /// Open a decoder that yields frames at `width` × `height`, resampled
    /// to `fps` so that frame `k` shows the source at `k / fps` seconds.
    fn open_decoder(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> LammahResult<Box<dyn FrameDecoder>>;

    fn open_encoder(&self, settings: &EncoderSettings) -> LammahResult<Box<dyn EncoderSink>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_naming() {
        assert_eq!(OverlayFormat::default(), OverlayFormat::Webm);
        assert_eq!(OverlayFormat::Webm.mime_type(), "video/webm");
        assert_eq!(OverlayFormat::Mp4.extension(), "mp4");
        assert_eq!(
            OverlayFormat::from(OverlayFormatName::Mp4),
            OverlayFormat::Mp4
        );
    }
}
