//! Capture/encode session.
//!
//! One [`EncodeSession`] owns the drawing surface, the source decoder, and
//! the live encoder for a single overlay pass. [`render_overlay`] drives it:
//! wait for metadata, open the session, render frames at the capture rate
//! until the source runs out or the budget elapses, finalize the encoder,
//! and write the concatenated chunks to disk.
//!
//! Every exit path tears the session down. The surface is released and any
//! decoder or encoder still attached is closed when the session is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use lammah_common::cancel::CancelToken;
use lammah_common::clock::SessionClock;
use lammah_common::config::OverlayDefaults;
use lammah_common::error::{LammahError, LammahResult};
use lammah_motion_model::media::{MediaRef, VideoMetadata};
use lammah_processing_core::pose::PoseEstimator;

use crate::backend::{EncoderSettings, EncoderSink, FrameDecoder, MediaBackend, OverlayFormat};
use crate::overlay::{OverlayRenderer, OverlayStyle};
use crate::surface::Surface;

/// Suffix appended to the input stem for overlay outputs.
pub const OVERLAY_SUFFIX: &str = "_motion_overlay";

/// Runtime configuration of an overlay pass.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Capture frame-rate hint.
    pub fps: u32,

    /// Wall-clock budget for the render loop. `None` renders the whole source.
    pub budget: Option<Duration>,

    pub format: OverlayFormat,

    pub video_bitrate_kbps: u32,

    /// How long to wait for source metadata.
    pub metadata_timeout: Duration,

    /// Output directory. `None` writes next to the input.
    pub output_dir: Option<PathBuf>,

    pub style: OverlayStyle,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::from(&OverlayDefaults::default())
    }
}

impl From<&OverlayDefaults> for OverlayConfig {
    fn from(defaults: &OverlayDefaults) -> Self {
        Self {
            fps: defaults.fps.max(1),
            budget: defaults
                .budget_secs
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            format: defaults.format.into(),
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            metadata_timeout: Duration::from_secs_f64(defaults.metadata_timeout_secs.max(0.0)),
            output_dir: defaults.output_dir.clone(),
            style: OverlayStyle::default(),
        }
    }
}

impl OverlayConfig {
    /// Where the overlay for `input` is written.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let dir = self
            .output_dir
            .clone()
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        dir.join(format!(
            "{}{}.{}",
            stem,
            OVERLAY_SUFFIX,
            self.format.extension()
        ))
    }
}

/// Surface, decoder, and encoder of one overlay pass.
pub struct EncodeSession {
    surface: Surface,
    decoder: Box<dyn FrameDecoder>,
    encoder: Box<dyn EncoderSink>,
    renderer: OverlayRenderer,
    capture_fps: u32,
    frames_rendered: u64,
}

impl EncodeSession {
    /// Create the surface, then open the decoder and the encoder.
    ///
    /// If any step fails, whatever was already opened is released before
    /// the error is returned.
    pub fn open(
        backend: &dyn MediaBackend,
        input: &Path,
        metadata: &VideoMetadata,
        config: &OverlayConfig,
    ) -> LammahResult<Self> {
        let surface = Surface::new(metadata.width, metadata.height)?;
        let decoder =
            backend.open_decoder(input, metadata.width, metadata.height, config.fps)?;
        let encoder = backend.open_encoder(&EncoderSettings {
            width: metadata.width,
            height: metadata.height,
            fps: config.fps,
            format: config.format,
            video_bitrate_kbps: config.video_bitrate_kbps,
        })?;

        tracing::debug!(
            backend = backend.name(),
            width = metadata.width,
            height = metadata.height,
            source_fps = metadata.fps,
            capture_fps = config.fps,
            "Encode session opened"
        );

        Ok(Self {
            surface,
            decoder,
            encoder,
            renderer: OverlayRenderer::new(config.style),
            capture_fps: config.fps.max(1),
            frames_rendered: 0,
        })
    }

    /// Decode, draw, and capture the next frame.
    ///
    /// The decoder emits one frame per capture tick, so capture frame `k`
    /// shows the source at `k / fps` seconds. Returns `false` once the
    /// source is exhausted.
    pub fn render_next(&mut self, pose: &dyn PoseEstimator) -> LammahResult<bool> {
        let Some(frame) = self.decoder.next_frame()? else {
            return Ok(false);
        };

        let timestamp =
            SessionClock::frame_to_secs(self.frames_rendered, self.capture_fps as f64);
        let landmarks = pose.landmarks_at(timestamp, self.surface.width(), self.surface.height());
        self.renderer
            .render_frame(&mut self.surface, &frame, &landmarks)?;
        self.encoder.write_frame(self.surface.canvas())?;

        self.frames_rendered += 1;
        Ok(true)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Stop decoding, finalize the encoder, and tear the session down.
    pub fn finish(mut self) -> LammahResult<Vec<Vec<u8>>> {
        self.decoder.close();
        let result = self.encoder.finish();
        self.teardown();
        result
    }

    fn teardown(&mut self) {
        self.decoder.close();
        if self.encoder.is_active() {
            self.encoder.abort();
        }
        self.surface.release();
    }
}

impl Drop for EncodeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Probe `input` on a blocking task, giving up after `timeout`.
///
/// A timed-out probe task is detached, not joined. Backends bound their own
/// probe so it cannot outlive the run; [`FfmpegBackend`] kills ffprobe.
///
/// [`FfmpegBackend`]: crate::ffmpeg::FfmpegBackend
pub async fn wait_for_metadata(
    backend: Arc<dyn MediaBackend>,
    input: &Path,
    timeout: Duration,
) -> LammahResult<VideoMetadata> {
    let path = input.to_path_buf();
    let probe = tokio::task::spawn_blocking(move || backend.probe(&path));

    let metadata = match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => {
            return Err(LammahError::source_decode(format!(
                "Metadata probe task failed: {join_err}"
            )))
        }
        Err(_) => {
            return Err(LammahError::source_decode(format!(
                "Timed out after {:.1}s waiting for video metadata",
                timeout.as_secs_f64()
            )))
        }
    };

    if !metadata.has_drawable_dimensions() {
        return Err(LammahError::source_decode(format!(
            "Video reports unusable dimensions {}x{}",
            metadata.width, metadata.height
        )));
    }
    Ok(metadata)
}

/// Render the skeletal overlay for `input` and write the encoded video.
///
/// Resolves with a handle to the written file, or an error when the source
/// cannot be decoded, the encoder fails, or `cancel` fires. Never resolves
/// with a partially written output.
pub async fn render_overlay(
    input: &Path,
    config: &OverlayConfig,
    backend: Arc<dyn MediaBackend>,
    pose: &dyn PoseEstimator,
    cancel: &CancelToken,
) -> LammahResult<MediaRef> {
    tracing::info!(
        input = %input.display(),
        backend = backend.name(),
        pose = pose.name(),
        format = ?config.format,
        budget_secs = config.budget.map(|b| b.as_secs_f64()),
        "Starting overlay pass"
    );

    cancel.check()?;
    let metadata = wait_for_metadata(Arc::clone(&backend), input, config.metadata_timeout).await?;
    cancel.check()?;

    let mut session = EncodeSession::open(backend.as_ref(), input, &metadata, config)?;

    let clock = SessionClock::start();
    let mut ticker = tokio::time::interval(SessionClock::frame_interval(config.fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        cancel.check()?;
        if clock.budget_exhausted(config.budget) {
            tracing::debug!(
                frames = session.frames_rendered(),
                "Encode budget elapsed"
            );
            break;
        }
        if !session.render_next(pose)? {
            tracing::debug!(frames = session.frames_rendered(), "Source exhausted");
            break;
        }
    }

    cancel.check()?;
    let frames = session.frames_rendered();
    if frames == 0 {
        return Err(LammahError::encode("No frames were rendered"));
    }

    let chunks = session.finish()?;
    let bytes = chunks.concat();
    if bytes.is_empty() {
        return Err(LammahError::encode("Encoder produced no output"));
    }

    let output = config.output_path_for(input);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, &bytes)?;

    tracing::info!(
        output = %output.display(),
        frames,
        chunks = chunks.len(),
        bytes = bytes.len(),
        started_at = clock.epoch_wall(),
        elapsed_ms = clock.elapsed().as_millis() as u64,
        "Overlay written"
    );

    Ok(MediaRef::overlay(output, config.format.mime_type()))
}
