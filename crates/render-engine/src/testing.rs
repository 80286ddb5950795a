//! In-memory media backend for tests.
//!
//! [`SyntheticBackend`] decodes generated test-pattern frames and "encodes"
//! them into one `frame:N;` chunk per frame, so tests can assert chunk order
//! without ffmpeg. Source frame `i` is filled with [`pattern_color`]`(i)` and
//! is resampled to the capture rate the same way ffmpeg's `fps` filter does.
//! Any stage can be forced to fail. [`HandleCounters`] tracks how many
//! decoders and encoders are still live, and can keep the captured frames.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{Rgb, RgbImage};

use lammah_common::clock::SessionClock;
use lammah_common::error::{LammahError, LammahResult};
use lammah_motion_model::media::VideoMetadata;

use crate::backend::{EncoderSettings, EncoderSink, FrameDecoder, MediaBackend};

/// Stage at which the synthetic backend fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Probe,
    OpenDecoder,
    OpenEncoder,
    WriteFrame,
    Finish,
}

/// Live handle bookkeeping shared between a backend and its handles.
#[derive(Debug, Default)]
pub struct HandleCounters {
    open_decoders: AtomicUsize,
    active_encoders: AtomicUsize,
    decoders_opened: AtomicUsize,
    encoders_opened: AtomicUsize,
    frames_encoded: AtomicU64,
    captures: Mutex<Vec<RgbImage>>,
}

impl HandleCounters {
    pub fn open_decoders(&self) -> usize {
        self.open_decoders.load(Ordering::SeqCst)
    }

    pub fn active_encoders(&self) -> usize {
        self.active_encoders.load(Ordering::SeqCst)
    }

    pub fn decoders_opened(&self) -> usize {
        self.decoders_opened.load(Ordering::SeqCst)
    }

    pub fn encoders_opened(&self) -> usize {
        self.encoders_opened.load(Ordering::SeqCst)
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded.load(Ordering::SeqCst)
    }

    /// Frames handed to encoders, in write order. Empty unless the backend
    /// was built with [`SyntheticBackend::keeping_captures`].
    pub fn captured_frames(&self) -> Vec<RgbImage> {
        self.captures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_capture(&self, frame: &RgbImage) {
        self.captures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(frame.clone());
    }

    /// No decoder or encoder is still attached.
    pub fn all_released(&self) -> bool {
        self.open_decoders() == 0 && self.active_encoders() == 0
    }
}

/// Backend producing a synthetic clip of fixed length.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    metadata: VideoMetadata,
    frame_limit: u64,
    failure: Option<FailurePoint>,
    probe_delay: Duration,
    keep_captures: bool,
    counters: Arc<HandleCounters>,
}

impl SyntheticBackend {
    /// A clip of `frames` frames at `fps`.
    pub fn new(width: u32, height: u32, fps: f64, frames: u64) -> Self {
        Self {
            metadata: VideoMetadata {
                width,
                height,
                fps,
                duration_secs: if fps > 0.0 { frames as f64 / fps } else { 0.0 },
                frame_count: Some(frames),
                codec: "synthetic".to_string(),
            },
            frame_limit: frames,
            failure: None,
            probe_delay: Duration::ZERO,
            keep_captures: false,
            counters: Arc::new(HandleCounters::default()),
        }
    }

    /// A 10-second 320x240 clip at 30 fps.
    pub fn ten_second_clip() -> Self {
        Self::new(320, 240, 30.0, 300)
    }

    pub fn with_failure(mut self, point: FailurePoint) -> Self {
        self.failure = Some(point);
        self
    }

    /// Make `probe` block for `delay` before answering.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Report different metadata than the frames actually produced.
    pub fn with_metadata(mut self, metadata: VideoMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Keep a copy of every encoded frame in [`HandleCounters::captured_frames`].
    pub fn keeping_captures(mut self) -> Self {
        self.keep_captures = true;
        self
    }

    pub fn counters(&self) -> Arc<HandleCounters> {
        Arc::clone(&self.counters)
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn fails_at(&self, point: FailurePoint) -> bool {
        self.failure == Some(point)
    }
}

impl MediaBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn probe(&self, path: &Path) -> LammahResult<VideoMetadata> {
        if !self.probe_delay.is_zero() {
            std::thread::sleep(self.probe_delay);
        }
        if self.fails_at(FailurePoint::Probe) {
            return Err(LammahError::source_decode(format!(
                "{} is not a decodable video",
                path.display()
            )));
        }
        Ok(self.metadata.clone())
    }

    fn open_decoder(
        &self,
        _path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> LammahResult<Box<dyn FrameDecoder>> {
        if self.fails_at(FailurePoint::OpenDecoder) {
            return Err(LammahError::source_decode("Synthetic decoder refused to open"));
        }
        self.counters.open_decoders.fetch_add(1, Ordering::SeqCst);
        self.counters.decoders_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticDecoder {
            width,
            height,
            next_index: 0,
            frame_limit: self.frame_limit,
            source_fps: self.metadata.fps,
            capture_fps: fps.max(1),
            open: true,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn open_encoder(&self, settings: &EncoderSettings) -> LammahResult<Box<dyn EncoderSink>> {
        if self.fails_at(FailurePoint::OpenEncoder) {
            return Err(LammahError::encode(format!(
                "Unsupported encoding: {:?}",
                settings.format
            )));
        }
        self.counters.active_encoders.fetch_add(1, Ordering::SeqCst);
        self.counters.encoders_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticEncoder {
            expected: (settings.width, settings.height),
            chunks: Vec::new(),
            active: true,
            fail_write: self.fails_at(FailurePoint::WriteFrame),
            fail_finish: self.fails_at(FailurePoint::Finish),
            keep_captures: self.keep_captures,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Test-pattern color of a synthetic frame.
pub fn pattern_color(index: u64) -> Rgb<u8> {
    Rgb([(index % 256) as u8, 96, 160])
}

struct SyntheticDecoder {
    width: u32,
    height: u32,
    /// Index of the next emitted (capture-rate) frame.
    next_index: u64,
    frame_limit: u64,
    source_fps: f64,
    capture_fps: u32,
    open: bool,
    counters: Arc<HandleCounters>,
}

impl SyntheticDecoder {
    /// Source frame shown at capture frame `index`.
    fn source_index(&self, index: u64) -> u64 {
        if self.source_fps <= 0.0 {
            return index;
        }
        let secs = SessionClock::frame_to_secs(index, self.capture_fps as f64);
        (secs * self.source_fps + 1e-9).floor() as u64
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn next_frame(&mut self) -> LammahResult<Option<RgbImage>> {
        if !self.open {
            return Ok(None);
        }
        let source_index = self.source_index(self.next_index);
        if source_index >= self.frame_limit {
            return Ok(None);
        }
        let frame = RgbImage::from_pixel(self.width, self.height, pattern_color(source_index));
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.counters.open_decoders.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for SyntheticDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

struct SyntheticEncoder {
    expected: (u32, u32),
    chunks: Vec<Vec<u8>>,
    active: bool,
    fail_write: bool,
    fail_finish: bool,
    keep_captures: bool,
    counters: Arc<HandleCounters>,
}

impl SyntheticEncoder {
    fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            self.counters.active_encoders.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl EncoderSink for SyntheticEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> LammahResult<()> {
        if !self.active {
            return Err(LammahError::encode("Encoder is no longer accepting frames"));
        }
        if self.fail_write {
            return Err(LammahError::encode("Synthetic encoder rejected frame"));
        }
        if frame.dimensions() != self.expected {
            return Err(LammahError::encode("Frame size does not match encoder"));
        }
        if self.keep_captures {
            self.counters.record_capture(frame);
        }
        let index = self.chunks.len();
        self.chunks.push(format!("frame:{index};").into_bytes());
        self.counters.frames_encoded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&mut self) -> LammahResult<Vec<Vec<u8>>> {
        if !self.active {
            return Err(LammahError::encode("Encoder already finished"));
        }
        self.deactivate();
        if self.fail_finish {
            return Err(LammahError::encode("Synthetic encoder failed to finalize"));
        }
        Ok(std::mem::take(&mut self.chunks))
    }

    fn abort(&mut self) {
        self.chunks.clear();
        self.deactivate();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SyntheticEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}
