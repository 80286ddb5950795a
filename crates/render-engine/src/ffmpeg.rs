//! ffmpeg-backed media backend.
//!
//! Decoding pipes raw `rgb24` frames out of an `ffmpeg` child process;
//! encoding pipes surface captures into a second child whose container
//! output is collected from stdout in arrival order. Metadata comes from
//! `ffprobe`.

use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use serde::Deserialize;

use lammah_common::error::{LammahError, LammahResult};
use lammah_motion_model::media::VideoMetadata;

use crate::backend::{EncoderSettings, EncoderSink, FrameDecoder, MediaBackend, OverlayFormat};

/// Size of each stdout read while collecting encoded output.
const CHUNK_SIZE: usize = 64 * 1024;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a running ffprobe is polled for exit.
const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Media backend that shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    /// ffprobe is killed once it runs longer than this.
    probe_timeout: Duration,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use specific binaries instead of the ones on `PATH`.
    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg.into(),
            ffprobe_bin: ffprobe.into(),
            ..Self::default()
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn ffmpeg_bin(&self) -> &str {
        &self.ffmpeg_bin
    }

    pub fn ffprobe_bin(&self) -> &str {
        &self.ffprobe_bin
    }
}

impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_bin) && command_exists(&self.ffprobe_bin)
    }

    fn probe(&self, path: &Path) -> LammahResult<VideoMetadata> {
        let mut child = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=codec_name,width,height,r_frame_rate,avg_frame_rate,nb_frames,duration:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LammahError::source_decode(format!("Failed to start ffprobe: {e}")))?;

        let stdout_task = child.stdout.take().map(drain_pipe);
        let stderr_task = child.stderr.take().map(drain_pipe);
        let status = wait_with_deadline(&mut child, self.probe_timeout);
        let stdout = join_pipe(stdout_task);
        let stderr = join_pipe(stderr_task);

        let status = match status {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(
                    path = %path.display(),
                    timeout_secs = self.probe_timeout.as_secs_f64(),
                    "ffprobe timed out and was killed"
                );
                return Err(LammahError::source_decode(format!(
                    "ffprobe did not finish within {:.1}s",
                    self.probe_timeout.as_secs_f64()
                )));
            }
            Err(e) => {
                return Err(LammahError::source_decode(format!(
                    "Failed to wait on ffprobe: {e}"
                )))
            }
        };

        if !status.success() {
            return Err(LammahError::source_decode(format!(
                "ffprobe failed (status {}): {}",
                status,
                stderr.trim()
            )));
        }

        parse_probe_output(&stdout)
    }

    fn open_decoder(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> LammahResult<Box<dyn FrameDecoder>> {
        let decoder = FfmpegDecoder::spawn(&self.ffmpeg_bin, path, width, height, fps)?;
        Ok(Box::new(decoder))
    }

    fn open_encoder(&self, settings: &EncoderSettings) -> LammahResult<Box<dyn EncoderSink>> {
        let encoder = FfmpegEncoder::spawn(&self.ffmpeg_bin, settings)?;
        Ok(Box::new(encoder))
    }
}

/// Streams decoded frames from an `ffmpeg` child process.
pub struct FfmpegDecoder {
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl FfmpegDecoder {
    fn spawn(
        ffmpeg: &str,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> LammahResult<Self> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-vf",
                &decoder_filter(width, height, fps),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(path = %path.display(), width, height, fps, "Spawning ffmpeg decoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| LammahError::source_decode(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LammahError::source_decode("Failed to capture ffmpeg stdout"))?;
        let stderr_task = child.stderr.take().map(drain_pipe);

        Ok(Self {
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr_task,
            width,
            height,
            frames_read: 0,
        })
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn next_frame(&mut self) -> LammahResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        match stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                tracing::debug!(frames = self.frames_read, "Decoder reached end of stream");
                // A zero-frame stream usually means ffmpeg rejected the input.
                if self.frames_read == 0 {
                    let stderr = self.finish_process();
                    if !stderr.trim().is_empty() {
                        return Err(LammahError::source_decode(format!(
                            "ffmpeg decode produced no frames: {}",
                            stderr.trim()
                        )));
                    }
                }
                self.stdout = None;
                return Ok(None);
            }
            Err(err) => {
                return Err(LammahError::source_decode(format!(
                    "Failed reading decoded frame: {err}"
                )));
            }
        }

        self.frames_read += 1;
        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| LammahError::source_decode("Decoded frame has unexpected size"))
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(frames = self.frames_read, "ffmpeg decoder closed");
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.join();
        }
    }

    fn is_open(&self) -> bool {
        self.child.is_some()
    }
}

impl FfmpegDecoder {
    /// Wait for the child to exit and return whatever it wrote to stderr.
    fn finish_process(&mut self) -> String {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

/// Encodes raw frames through an `ffmpeg` child process.
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_task: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    frames_written: u64,
}

impl FfmpegEncoder {
    fn spawn(ffmpeg: &str, settings: &EncoderSettings) -> LammahResult<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(LammahError::encode("Encoder needs non-zero frame dimensions"));
        }

        let args = encoder_args(settings);
        tracing::debug!(args = ?args, "Spawning ffmpeg encoder");

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LammahError::encode(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            format = ?settings.format,
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            "ffmpeg encoder started"
        );

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(LammahError::encode("Failed to capture ffmpeg pipes"));
        };
        let stderr_task = child.stderr.take().map(drain_pipe);

        // Collect container output concurrently so ffmpeg never blocks on a full pipe.
        let stdout_task = std::thread::spawn(move || -> std::io::Result<Vec<Vec<u8>>> {
            let mut reader = stdout;
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok(chunks)
        });

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout_task: Some(stdout_task),
            stderr_task,
            frame_len: settings.width as usize * settings.height as usize * 3,
            frames_written: 0,
        })
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_else(|| "<failed to join stderr reader>".to_string())
    }
}

impl EncoderSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> LammahResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| LammahError::encode("Encoder is no longer accepting frames"))?;

        if frame.as_raw().len() != self.frame_len {
            return Err(LammahError::encode(format!(
                "Frame has {} bytes, encoder expects {}",
                frame.as_raw().len(),
                self.frame_len
            )));
        }

        stdin
            .write_all(frame.as_raw())
            .map_err(|e| LammahError::encode(format!("Failed writing frame to ffmpeg: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> LammahResult<Vec<Vec<u8>>> {
        // Closing stdin is the end-of-stream signal.
        self.stdin = None;

        let mut child = self
            .child
            .take()
            .ok_or_else(|| LammahError::encode("Encoder already finished"))?;
        let status = child
            .wait()
            .map_err(|e| LammahError::encode(format!("Failed to wait on ffmpeg: {e}")))?;

        let chunks = match self.stdout_task.take().map(|task| task.join()) {
            Some(Ok(Ok(chunks))) => chunks,
            Some(Ok(Err(err))) => {
                return Err(LammahError::encode(format!(
                    "Failed reading encoded output: {err}"
                )))
            }
            _ => return Err(LammahError::encode("Failed to join encoder output reader")),
        };
        let stderr_output = self.join_stderr();

        if !status.success() {
            return Err(LammahError::encode(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        tracing::debug!(
            frames = self.frames_written,
            chunks = chunks.len(),
            bytes = chunks.iter().map(Vec::len).sum::<usize>(),
            "ffmpeg encoder finalized"
        );
        Ok(chunks)
    }

    fn abort(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(frames = self.frames_written, "ffmpeg encoder aborted");
        }
        if let Some(task) = self.stdout_task.take() {
            let _ = task.join();
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.join();
        }
    }

    fn is_active(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Read a child pipe to the end on its own thread.
fn drain_pipe<R: Read + Send + 'static>(pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(pipe);
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => format!("<failed to read child output: {err}>"),
        }
    })
}

fn join_pipe(task: Option<JoinHandle<String>>) -> String {
    task.and_then(|task| task.join().ok()).unwrap_or_default()
}

/// Wait for `child` to exit. Past `timeout` it is killed and `None` returned.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(PROBE_POLL_INTERVAL);
    }
}

/// Resample to the capture rate, then scale to the surface.
fn decoder_filter(width: u32, height: u32, fps: u32) -> String {
    format!("fps={},scale={width}:{height}", fps.max(1))
}

fn encoder_args(settings: &EncoderSettings) -> Vec<String> {
    let mut args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{}x{}", settings.width, settings.height),
        "-r".to_string(),
        settings.fps.max(1).to_string(),
        "-i".to_string(),
        "-".to_string(),
        // yuv420p needs even dimensions.
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        "-an".to_string(),
    ];
    args.extend(codec_args_for_format(settings.format, settings.video_bitrate_kbps));
    args.push("-".to_string());
    args
}

fn codec_args_for_format(format: OverlayFormat, video_bitrate_kbps: u32) -> Vec<String> {
    let video_bitrate = format!("{}k", video_bitrate_kbps.max(250));

    match format {
        OverlayFormat::Webm => vec![
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-deadline".to_string(),
            "realtime".to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-f".to_string(),
            "webm".to_string(),
        ],
        // Non-seekable output needs a fragmented mp4.
        OverlayFormat::Mp4 => vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-movflags".to_string(),
            "frag_keyframe+empty_moov".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ],
    }
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(json: &str) -> LammahResult<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| LammahError::source_decode(format!("Unreadable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| LammahError::source_decode("Input has no video stream"))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(LammahError::source_decode(format!(
            "Video stream has no usable dimensions ({width}x{height})"
        )));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let duration_secs = stream
        .duration
        .as_deref()
        .and_then(parse_positive)
        .or_else(|| {
            probe
                .format
                .and_then(|f| f.duration)
                .as_deref()
                .and_then(parse_positive)
        })
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        duration_secs,
        frame_count: stream.nb_frames.and_then(|n| n.trim().parse::<u64>().ok()),
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
