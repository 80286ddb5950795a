//! End-to-end runs against the synthetic media backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lammah_analysis_engine::{
    AnalysisPipeline, FrameCountPolicy, PipelineConfig, PipelineState, ProgressCallback,
};
use lammah_common::cancel::CancelToken;
use lammah_common::error::LammahError;
use lammah_motion_model::media::{MediaKind, VideoMetadata};
use lammah_motion_model::result::AnalysisProgress;
use lammah_motion_model::table::{csv_header, samples_to_csv};
use lammah_processing_core::metric_sampler::SamplerConfig;
use lammah_processing_core::pose::SwayPoseEstimator;
use lammah_render_engine::session::OverlayConfig;
use lammah_render_engine::testing::{FailurePoint, SyntheticBackend};

const INPUT_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42 synthetic input clip";

struct Fixture {
    dir: PathBuf,
    input: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "lammah-pipeline-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("jump.mp4");
        std::fs::write(&input, INPUT_BYTES).unwrap();
        Self { dir, input }
    }

    fn config(&self, seed: u64) -> PipelineConfig {
        PipelineConfig {
            seed: Some(seed),
            frame_count: FrameCountPolicy::default(),
            max_probed_frames: 1_000,
            sampler: SamplerConfig {
                frame_delay: Duration::ZERO,
            },
            overlay: OverlayConfig {
                fps: 1000,
                budget: None,
                output_dir: Some(self.dir.join("out")),
                metadata_timeout: Duration::from_secs(5),
                ..OverlayConfig::default()
            },
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn pipeline(config: PipelineConfig, backend: SyntheticBackend) -> AnalysisPipeline {
    AnalysisPipeline::new(
        config,
        Arc::new(backend),
        Arc::new(SwayPoseEstimator::default()),
    )
}

fn recorder() -> (Arc<Mutex<Vec<AnalysisProgress>>>, ProgressCallback) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));
    (reports, callback)
}

#[tokio::test]
async fn ten_second_clip_produces_full_result() {
    let fixture = Fixture::new("scenario-a");
    let backend = SyntheticBackend::ten_second_clip();
    let counters = backend.counters();
    let mut config = fixture.config(42);
    config.overlay.fps = 100;
    config.overlay.budget = Some(Duration::from_millis(200));
    let mut pipeline = pipeline(config, backend);
    let (reports, callback) = recorder();

    let result = pipeline
        .run_analysis(&fixture.input, Some(callback), &CancelToken::new())
        .await
        .unwrap();

    let total = result.total_frames;
    assert!((100..300).contains(&total), "total_frames = {total}");
    assert_eq!(result.samples.len() as u64, total);
    for (i, sample) in result.samples.iter().enumerate() {
        assert_eq!(sample.frame_index, i as u64);
    }

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len() as u64, total);
    assert!(reports.windows(2).all(|w| w[1].percent > w[0].percent));
    let last = reports.last().unwrap();
    assert_eq!(
        (last.percent, last.frames_done, last.total_frames),
        (100.0, total, total)
    );
    assert_eq!(reports.iter().filter(|p| p.percent == 100.0).count(), 1);

    assert!(!result.degraded);
    assert_eq!(result.overlay_video.kind, MediaKind::Overlay);
    assert_eq!(
        result.overlay_video.path,
        fixture.dir.join("out").join("jump_motion_overlay.webm")
    );
    let overlay = result.overlay_video.read_bytes().unwrap();
    assert!(overlay.starts_with(b"frame:0;"));
    let encoded = counters.frames_encoded();
    assert!((1..300).contains(&encoded), "encoded {encoded} frames");

    assert_eq!(pipeline.state(), PipelineState::Done { degraded: false });
    assert!(counters.all_released());
}

#[tokio::test]
async fn undecodable_input_falls_back_to_original() {
    let fixture = Fixture::new("scenario-b");
    let backend = SyntheticBackend::ten_second_clip().with_failure(FailurePoint::Probe);
    let counters = backend.counters();
    let mut pipeline = pipeline(fixture.config(7), backend);

    let result = pipeline
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();

    assert!(result.degraded);
    assert!(result.failure.is_some());
    assert_eq!(result.overlay_video.kind, MediaKind::Original);
    assert_eq!(result.overlay_video.path, fixture.input);
    assert_eq!(result.overlay_video.read_bytes().unwrap(), INPUT_BYTES);
    assert_eq!(result.samples.len() as u64, result.total_frames);
    assert_eq!(pipeline.state(), PipelineState::Done { degraded: true });
    assert_eq!(counters.decoders_opened(), 0);
    assert!(!fixture.dir.join("out").join("jump_motion_overlay.webm").exists());
}

#[tokio::test]
async fn every_overlay_failure_is_absorbed_and_released() {
    for point in [
        FailurePoint::Probe,
        FailurePoint::OpenDecoder,
        FailurePoint::OpenEncoder,
        FailurePoint::WriteFrame,
        FailurePoint::Finish,
    ] {
        let fixture = Fixture::new(&format!("failure-{point:?}"));
        let backend = SyntheticBackend::new(48, 32, 1000.0, 20).with_failure(point);
        let counters = backend.counters();
        let mut pipeline = pipeline(fixture.config(3), backend);

        let result = pipeline
            .run_analysis(&fixture.input, None, &CancelToken::new())
            .await
            .unwrap_or_else(|e| panic!("{point:?} was not absorbed: {e}"));

        assert!(result.degraded, "{point:?}");
        assert_eq!(result.overlay_video.read_bytes().unwrap(), INPUT_BYTES);
        assert!(counters.all_released(), "{point:?} left a handle attached");
    }
}

#[tokio::test]
async fn samples_export_to_csv_in_frame_order() {
    let fixture = Fixture::new("scenario-c");
    let mut pipeline = pipeline(fixture.config(11), SyntheticBackend::new(32, 32, 1000.0, 3));
    let result = pipeline
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();

    let csv = samples_to_csv(&result.samples);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Frame,Motion,ArmClosure,ShoulderSlope,FootDistance,HandVelocity"
    );
    assert_eq!(lines[0], csv_header());
    assert_eq!(lines.len() as u64, result.total_frames + 1);
    for (i, line) in lines[1..].iter().enumerate() {
        let cells: Vec<&str> = line.split(',').collect();
        assert_eq!(cells[0], i.to_string());
        assert!(cells[1..]
            .iter()
            .all(|c| c.split('.').nth(1).map(str::len) == Some(4)));
    }
}

#[tokio::test]
async fn same_seed_reproduces_the_run() {
    let fixture = Fixture::new("seeded");
    let mut first = pipeline(fixture.config(2024), SyntheticBackend::new(32, 32, 1000.0, 2));
    let mut second = pipeline(fixture.config(2024), SyntheticBackend::new(32, 32, 1000.0, 2));

    let a = first
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();
    let b = second
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(a.total_frames, b.total_frames);
    assert_eq!(a.samples, b.samples);
}

#[tokio::test]
async fn probed_policy_uses_source_frame_count() {
    let fixture = Fixture::new("probed");
    let mut config = fixture.config(1);
    config.frame_count = FrameCountPolicy::Probed { min: 100, max: 300 };
    let mut pipeline = pipeline(config, SyntheticBackend::new(32, 32, 1000.0, 42));

    let result = pipeline
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result.total_frames, 42);
    assert!(!result.degraded);
}

#[tokio::test]
async fn probed_policy_falls_back_to_estimate() {
    let fixture = Fixture::new("probed-fallback");
    let mut config = fixture.config(1);
    config.frame_count = FrameCountPolicy::Probed { min: 100, max: 300 };
    let backend = SyntheticBackend::ten_second_clip().with_failure(FailurePoint::Probe);
    let mut pipeline = pipeline(config, backend);

    let result = pipeline
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();
    assert!((100..300).contains(&result.total_frames));
    assert!(result.degraded);
}

#[tokio::test]
async fn implausible_probed_count_falls_back_to_estimate() {
    let fixture = Fixture::new("probed-huge");
    let mut config = fixture.config(8);
    config.frame_count = FrameCountPolicy::Probed { min: 100, max: 300 };
    let backend = SyntheticBackend::new(32, 32, 1000.0, 3);
    let corrupt = VideoMetadata {
        frame_count: Some(u64::MAX),
        ..backend.metadata().clone()
    };
    let mut pipeline = pipeline(config, backend.with_metadata(corrupt));

    let result = pipeline
        .run_analysis(&fixture.input, None, &CancelToken::new())
        .await
        .unwrap();
    assert!((100..300).contains(&result.total_frames));
    assert_eq!(result.samples.len() as u64, result.total_frames);
    assert!(!result.degraded);
}

#[tokio::test]
async fn cancellation_during_sampling_skips_overlay() {
    let fixture = Fixture::new("cancel-sampling");
    let backend = SyntheticBackend::ten_second_clip();
    let counters = backend.counters();
    let mut pipeline = pipeline(fixture.config(5), backend);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let callback: ProgressCallback = Box::new(move |p| {
        if p.frames_done == 25 {
            trigger.cancel();
        }
    });

    let err = pipeline
        .run_analysis(&fixture.input, Some(callback), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, LammahError::Cancelled));
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert_eq!(counters.decoders_opened(), 0);
    assert_eq!(counters.encoders_opened(), 0);
}

#[tokio::test]
async fn cancellation_during_overlay_releases_session() {
    let fixture = Fixture::new("cancel-overlay");
    let backend = SyntheticBackend::new(32, 32, 30.0, 1_000_000);
    let counters = backend.counters();
    let mut config = fixture.config(9);
    config.overlay.fps = 100;
    let mut pipeline = pipeline(config, backend);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let watched = Arc::clone(&counters);
    let canceller = tokio::spawn(async move {
        while watched.frames_encoded() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        trigger.cancel();
    });

    let err = pipeline
        .run_analysis(&fixture.input, None, &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, LammahError::Cancelled));
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert!(counters.all_released());
    assert!(!Path::new(&fixture.dir.join("out").join("jump_motion_overlay.webm")).exists());
}
