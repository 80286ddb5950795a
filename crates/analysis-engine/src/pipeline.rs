//! Pipeline orchestration for one analysis run.
//!
//! A run moves through `Idle → Sampling → Overlaying → Done`. Sampling always
//! completes unless the run is cancelled. Any overlay failure is absorbed:
//! the run still resolves, with the original video standing in for the
//! overlay and `degraded` set.

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use lammah_common::cancel::CancelToken;
use lammah_common::config::{AppConfig, FrameCountMode};
use lammah_common::error::{LammahError, LammahResult};
use lammah_motion_model::result::{AnalysisProgress, AnalysisResult};
use lammah_processing_core::metric_sampler::{estimate_total_frames, MetricSampler, SamplerConfig};
use lammah_processing_core::pose::{PoseEstimator, SwayPoseEstimator};
use lammah_render_engine::backend::MediaBackend;
use lammah_render_engine::ffmpeg::FfmpegBackend;
use lammah_render_engine::session::{render_overlay, wait_for_metadata, OverlayConfig};

/// Progress callback invoked after every sampled frame.
pub type ProgressCallback = Box<dyn Fn(AnalysisProgress) + Send>;

/// How many frames a run samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountPolicy {
    /// Draw a count uniformly from `[min, max)`.
    Estimated { min: u64, max: u64 },
    /// Use the input's own frame count. When it cannot be read, fall back to
    /// an estimate from `[min, max)`.
    Probed { min: u64, max: u64 },
}

impl Default for FrameCountPolicy {
    fn default() -> Self {
        FrameCountPolicy::Estimated { min: 100, max: 300 }
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seed for frame-count and metric randomness. `None` seeds from entropy.
    pub seed: Option<u64>,

    pub frame_count: FrameCountPolicy,

    /// Probed frame counts above this are treated as unreadable.
    pub max_probed_frames: u64,

    pub sampler: SamplerConfig,

    pub overlay: OverlayConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        let analysis = &config.analysis;
        let (min, max) = (analysis.min_frames, analysis.max_frames);
        Self {
            seed: analysis.seed,
            frame_count: match analysis.frame_count {
                FrameCountMode::Estimated => FrameCountPolicy::Estimated { min, max },
                FrameCountMode::Probed => FrameCountPolicy::Probed { min, max },
            },
            max_probed_frames: analysis.max_probed_frames,
            sampler: SamplerConfig::from(analysis),
            overlay: OverlayConfig::from(&config.overlay),
        }
    }
}

/// Where a pipeline is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No run started yet.
    Idle,
    /// Synthesizing motion samples.
    Sampling,
    /// Rendering and encoding the overlay video.
    Overlaying,
    /// Run finished. `degraded` is set when the original video was substituted.
    Done { degraded: bool },
    /// Run stopped by its cancel token.
    Cancelled,
}

/// Drives sampling and overlay rendering for one video at a time.
pub struct AnalysisPipeline {
    config: PipelineConfig,
    state: PipelineState,
    backend: Arc<dyn MediaBackend>,
    pose: Arc<dyn PoseEstimator>,
}

impl AnalysisPipeline {
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn MediaBackend>,
        pose: Arc<dyn PoseEstimator>,
    ) -> Self {
        Self {
            config,
            state: PipelineState::Idle,
            backend,
            pose,
        }
    }

    /// Pipeline using ffmpeg and the sway pose estimator.
    pub fn with_ffmpeg(config: PipelineConfig) -> Self {
        let backend = FfmpegBackend::new().with_probe_timeout(config.overlay.metadata_timeout);
        Self::new(
            config,
            Arc::new(backend),
            Arc::new(SwayPoseEstimator::default()),
        )
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn MediaBackend {
        self.backend.as_ref()
    }

    /// Analyze `input`: sample metrics, then render the overlay.
    ///
    /// Progress is reported after every sample and reaches exactly 100 once.
    /// Overlay failures never surface as errors. The only errors are a
    /// missing input (before sampling starts) and cancellation.
    pub async fn run_analysis(
        &mut self,
        input: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancelToken,
    ) -> LammahResult<AnalysisResult> {
        if !input.exists() {
            return Err(LammahError::FileNotFound {
                path: input.to_path_buf(),
            });
        }
        if !input.is_file() {
            return Err(LammahError::invalid_input(format!(
                "{} is not a file",
                input.display()
            )));
        }

        tracing::info!(
            input = %input.display(),
            seed = ?self.config.seed,
            policy = ?self.config.frame_count,
            "Starting analysis run"
        );

        self.state = PipelineState::Idle;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let result = self.drive(input, progress, cancel, &mut rng).await;
        match &result {
            Ok(result) => {
                self.state = PipelineState::Done {
                    degraded: result.degraded,
                };
                tracing::info!(
                    frames = result.total_frames,
                    degraded = result.degraded,
                    overlay = %result.overlay_video.path.display(),
                    "Analysis run finished"
                );
            }
            Err(LammahError::Cancelled) => {
                self.state = PipelineState::Cancelled;
                tracing::info!(input = %input.display(), "Analysis run cancelled");
            }
            Err(_) => {}
        }
        result
    }

    async fn drive(
        &mut self,
        input: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancelToken,
        rng: &mut StdRng,
    ) -> LammahResult<AnalysisResult> {
        let total_frames = self.choose_frame_count(input, rng).await;
        cancel.check()?;

        self.state = PipelineState::Sampling;
        let sampler = MetricSampler::new(self.config.sampler.clone());
        let on_progress = move |report: AnalysisProgress| {
            if let Some(cb) = &progress {
                cb(report);
            }
        };
        let samples = sampler.sample(total_frames, rng, on_progress, cancel).await?;

        self.state = PipelineState::Overlaying;
        let overlay = render_overlay(
            input,
            &self.config.overlay,
            Arc::clone(&self.backend),
            self.pose.as_ref(),
            cancel,
        )
        .await;

        match overlay {
            Ok(media) => Ok(AnalysisResult::with_overlay(input, samples, media)),
            Err(err) if err.is_overlay_failure() => {
                tracing::warn!(
                    input = %input.display(),
                    error = %err,
                    "Overlay failed, falling back to the original video"
                );
                Ok(AnalysisResult::with_fallback(input, samples, err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    async fn choose_frame_count(&self, input: &Path, rng: &mut StdRng) -> u64 {
        match self.config.frame_count {
            FrameCountPolicy::Estimated { min, max } => estimate_total_frames(rng, min, max),
            FrameCountPolicy::Probed { min, max } => {
                let probed = wait_for_metadata(
                    Arc::clone(&self.backend),
                    input,
                    self.config.overlay.metadata_timeout,
                )
                .await
                .map(|meta| meta.estimated_frames());

                match probed {
                    Ok(Some(frames)) if frames <= self.config.max_probed_frames => {
                        tracing::debug!(frames, "Using probed frame count");
                        frames
                    }
                    Ok(Some(frames)) => {
                        tracing::warn!(
                            frames,
                            limit = self.config.max_probed_frames,
                            "Probed frame count is implausible, using estimate"
                        );
                        estimate_total_frames(rng, min, max)
                    }
                    Ok(None) => {
                        tracing::warn!("Input does not report a frame count, using estimate");
                        estimate_total_frames(rng, min, max)
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Frame count probe failed, using estimate");
                        estimate_total_frames(rng, min, max)
                    }
                }
            }
        }
    }
}

/// Analyze one video with default settings, ffmpeg, and the sway estimator.
pub async fn run_analysis(
    input: &Path,
    progress: Option<ProgressCallback>,
) -> LammahResult<AnalysisResult> {
    AnalysisPipeline::with_ffmpeg(PipelineConfig::default())
        .run_analysis(input, progress, &CancelToken::new())
        .await
}
