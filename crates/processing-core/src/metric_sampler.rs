//! Motion metric sampling.
//!
//! Synthesizes one [`MotionSample`] per frame index and reports progress
//! after each one.
//!
//! # Signal model
//!
//! Every metric combines a bounded random component with a periodic
//! component that is sinusoidal in the frame index:
//!
//! ```text
//! value(frame) = base + U[0,1) * random_amplitude + periodic_amplitude * wave(frame * frequency)
//! ```
//!
//! The per-metric constants live in [`MetricProfile::for_metric`]. The result
//! is bounded, varies smoothly over time, and never degenerates to a constant.

use std::time::Duration;

use lammah_common::cancel::CancelToken;
use lammah_common::config::AnalysisDefaults;
use lammah_common::error::LammahResult;
use lammah_motion_model::result::AnalysisProgress;
use lammah_motion_model::sample::{FrameIndex, Metric, MotionSample};
use rand::Rng;

/// Upper bound on samples reserved up front. Longer runs grow on demand.
const MAX_PREALLOCATED_SAMPLES: u64 = 4096;

/// Configuration for the metric sampler.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Pause after each sample so progress is observable incrementally.
    /// `Duration::ZERO` still yields to the scheduler once per frame.
    pub frame_delay: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(50),
        }
    }
}

impl From<&AnalysisDefaults> for SamplerConfig {
    fn from(defaults: &AnalysisDefaults) -> Self {
        Self {
            frame_delay: Duration::from_millis(defaults.frame_delay_ms),
        }
    }
}

/// Periodic waveform of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sin,
    Cos,
}

impl Wave {
    fn eval(self, phase: f64) -> f64 {
        match self {
            Wave::Sin => phase.sin(),
            Wave::Cos => phase.cos(),
        }
    }
}

/// Signal constants for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricProfile {
    /// Constant offset.
    pub base: f64,
    /// Span of the uniform random component.
    pub random_amplitude: f64,
    /// Amplitude of the periodic component.
    pub periodic_amplitude: f64,
    /// Radians per frame of the periodic component.
    pub frequency: f64,
    pub wave: Wave,
}

impl MetricProfile {
    pub const fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Motion => Self {
                base: 0.0,
                random_amplitude: 0.1,
                periodic_amplitude: 0.02,
                frequency: 0.1,
                wave: Wave::Sin,
            },
            Metric::ArmClosure => Self {
                base: 0.2,
                random_amplitude: 0.5,
                periodic_amplitude: 0.1,
                frequency: 0.05,
                wave: Wave::Cos,
            },
            Metric::ShoulderSlope => Self {
                base: 80.0,
                random_amplitude: 20.0,
                periodic_amplitude: 5.0,
                frequency: 0.03,
                wave: Wave::Sin,
            },
            Metric::FootDistance => Self {
                base: 0.15,
                random_amplitude: 0.3,
                periodic_amplitude: 0.05,
                frequency: 0.08,
                wave: Wave::Cos,
            },
            Metric::HandVelocity => Self {
                base: 0.0,
                random_amplitude: 0.2,
                periodic_amplitude: 0.1,
                frequency: 0.15,
                wave: Wave::Sin,
            },
        }
    }

    /// Deterministic periodic component at a frame.
    pub fn periodic(&self, frame_index: FrameIndex) -> f64 {
        self.periodic_amplitude * self.wave.eval(frame_index as f64 * self.frequency)
    }

    /// Metric value at a frame for a uniform draw `unit` in `[0, 1)`.
    pub fn value(&self, frame_index: FrameIndex, unit: f64) -> f64 {
        self.base + unit * self.random_amplitude + self.periodic(frame_index)
    }

    /// Closed envelope every value of this metric falls in.
    pub fn bounds(&self) -> (f64, f64) {
        let periodic = self.periodic_amplitude.abs();
        (
            self.base - periodic,
            self.base + self.random_amplitude + periodic,
        )
    }
}

/// Draw a total-frame estimate uniformly from `[min, max)`.
///
/// Degenerate ranges collapse to `min` (at least one frame).
pub fn estimate_total_frames<R: Rng>(rng: &mut R, min: u64, max: u64) -> u64 {
    let min = min.max(1);
    if max <= min {
        return min;
    }
    rng.gen_range(min..max)
}

/// Walks frame indices and synthesizes one sample per frame.
#[derive(Debug, Clone, Default)]
pub struct MetricSampler {
    config: SamplerConfig,
}

impl MetricSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Synthesize the sample for one frame.
    ///
    /// Consumes one uniform draw per metric, in [`Metric::ALL`] order.
    pub fn synthesize<R: Rng>(frame_index: FrameIndex, rng: &mut R) -> MotionSample {
        let mut draw = |metric: Metric| {
            let unit: f64 = rng.gen();
            MetricProfile::for_metric(metric).value(frame_index, unit)
        };

        MotionSample {
            frame_index,
            motion: draw(Metric::Motion),
            arm_closure: draw(Metric::ArmClosure),
            shoulder_slope: draw(Metric::ShoulderSlope),
            foot_distance: draw(Metric::FootDistance),
            hand_velocity: draw(Metric::HandVelocity),
        }
    }

    /// Sample `total_frames` frames in order.
    ///
    /// `on_progress` is invoked after every sample with strictly increasing
    /// `frames_done`; the last report is exactly 100 percent. Between samples
    /// the task sleeps for the configured delay. Cancellation is checked
    /// before each frame.
    pub async fn sample<R, F>(
        &self,
        total_frames: u64,
        rng: &mut R,
        mut on_progress: F,
        cancel: &CancelToken,
    ) -> LammahResult<Vec<MotionSample>>
    where
        R: Rng + Send,
        F: FnMut(AnalysisProgress) + Send,
    {
        tracing::info!(
            total_frames,
            frame_delay_ms = self.config.frame_delay.as_millis() as u64,
            "Sampling motion metrics"
        );

        let mut samples = Vec::with_capacity(total_frames.min(MAX_PREALLOCATED_SAMPLES) as usize);
        for frame_index in 0..total_frames {
            cancel.check()?;

            samples.push(Self::synthesize(frame_index, rng));
            on_progress(AnalysisProgress::new(frame_index + 1, total_frames));

            if self.config.frame_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.frame_delay).await;
            }
        }

        tracing::debug!(samples = samples.len(), "Sampling finished");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lammah_common::error::LammahError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fast_sampler() -> MetricSampler {
        MetricSampler::new(SamplerConfig {
            frame_delay: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_sample_indices_are_contiguous() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = fast_sampler()
            .sample(120, &mut rng, |_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(samples.len(), 120);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.frame_index, i as u64);
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_one_hundred() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut reports = Vec::new();
        fast_sampler()
            .sample(37, &mut rng, |p| reports.push(p), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(reports.len(), 37);
        for pair in reports.windows(2) {
            assert!(pair[1].percent > pair[0].percent);
            assert_eq!(pair[1].frames_done, pair[0].frames_done + 1);
        }
        let last = reports.last().unwrap();
        assert_eq!(last.percent, 100.0);
        assert_eq!((last.frames_done, last.total_frames), (37, 37));
        assert_eq!(reports.iter().filter(|p| p.percent == 100.0).count(), 1);
    }

    #[tokio::test]
    async fn test_same_seed_reproduces_samples() {
        let sampler = fast_sampler();
        let mut a = StdRng::seed_from_u64(2024);
        let mut b = StdRng::seed_from_u64(2024);
        let first = sampler
            .sample(50, &mut a, |_| {}, &CancelToken::new())
            .await
            .unwrap();
        let second = sampler
            .sample(50, &mut b, |_| {}, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancelled_sampling_stops() {
        let cancel = CancelToken::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = 0;
        let trigger = cancel.clone();
        let result = fast_sampler()
            .sample(
                100,
                &mut rng,
                |p| {
                    seen = p.frames_done;
                    if p.frames_done == 10 {
                        trigger.cancel();
                    }
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(LammahError::Cancelled)));
        assert_eq!(seen, 10);
    }

    #[tokio::test]
    async fn test_huge_frame_count_reserves_bounded_capacity() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut rng = StdRng::seed_from_u64(4);
        let result = fast_sampler()
            .sample(
                u64::MAX,
                &mut rng,
                |p| {
                    if p.frames_done == 3 {
                        trigger.cancel();
                    }
                },
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(LammahError::Cancelled)));
    }

    #[tokio::test]
    async fn test_pacing_delay_is_applied() {
        let sampler = MetricSampler::new(SamplerConfig {
            frame_delay: Duration::from_millis(5),
        });
        let mut rng = StdRng::seed_from_u64(3);
        let started = std::time::Instant::now();
        sampler
            .sample(4, &mut rng, |_| {}, &CancelToken::new())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_periodic_component_varies() {
        let profile = MetricProfile::for_metric(Metric::HandVelocity);
        let values: Vec<f64> = (0..20).map(|f| profile.periodic(f)).collect();
        assert!(values.iter().any(|v| (v - values[0]).abs() > 1e-3));
        assert_eq!(profile.periodic(0), 0.0);
    }

    #[test]
    fn test_shoulder_slope_envelope() {
        let (low, high) = MetricProfile::for_metric(Metric::ShoulderSlope).bounds();
        assert_eq!((low, high), (75.0, 105.0));
    }

    #[test]
    fn test_estimate_range() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let n = estimate_total_frames(&mut rng, 100, 300);
            assert!((100..300).contains(&n));
        }
        assert_eq!(estimate_total_frames(&mut rng, 5, 5), 5);
        assert_eq!(estimate_total_frames(&mut rng, 0, 0), 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_metrics_stay_within_profile_bounds(seed in any::<u64>(), frame in 0u64..10_000) {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = MetricSampler::synthesize(frame, &mut rng);
                prop_assert_eq!(sample.frame_index, frame);
                for metric in Metric::ALL {
                    let (low, high) = MetricProfile::for_metric(metric).bounds();
                    let value = metric.value(&sample);
                    prop_assert!(value >= low && value <= high, "{metric} = {value} outside [{low}, {high}]");
                }
            }

            #[test]
            fn prop_shoulder_slope_in_documented_range(seed in any::<u64>(), frame in 0u64..1_000) {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = MetricSampler::synthesize(frame, &mut rng);
                prop_assert!((75.0..=105.0).contains(&sample.shoulder_slope));
            }
        }
    }
}
