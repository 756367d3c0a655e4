//! Whole-clip stabilization analysis.
//!
//! Drives the frame tracker over every consecutive frame pair, then
//! integrates, smooths and synthesizes corrective transforms.

use image::GrayImage;
use steadyframe_common::config::StabilizationDefaults;
use steadyframe_common::error::SteadyResult;
use steadyframe_stabilization_model::{
    CameraTrajectory, CorrectiveTransform, MotionDelta, StabilizationData,
};

use crate::primitives::{MotionPrimitives, NativePrimitives};
use crate::synthesize::synthesize;
use crate::tracker::{FrameTracker, TrackerConfig, TrackerState};
use crate::trajectory::{accumulate, TrajectorySmoother};

/// Sequential access to the frames of a clip.
pub trait FrameSource {
    /// Number of frames in the clip.
    fn frame_count(&self) -> usize;

    /// Frame `index` converted to 8-bit grayscale.
    fn gray_frame(&self, index: usize) -> SteadyResult<GrayImage>;
}

/// Progress callback for analysis runs.
pub type ProgressCallback = Box<dyn Fn(AnalysisProgress) + Send>;

/// Analysis progress report.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames tracked so far.
    pub frames_processed: usize,

    /// Total frames in the clip.
    pub total_frames: usize,
}

/// Every table produced by one analysis run.
///
/// All tables are indexed by delta index: entry `i` describes the motion
/// into frame `i + 1` of the clip.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub deltas: Vec<MotionDelta>,
    pub trajectory: Vec<CameraTrajectory>,
    pub smoothed: Vec<CameraTrajectory>,
    pub transforms: Vec<CorrectiveTransform>,
    /// Delta indices whose motion came from the fallback policy.
    pub fallback_frames: Vec<usize>,
}

impl AnalysisOutput {
    /// The persisted subset: smoothed trajectory and transforms.
    pub fn into_data(self) -> SteadyResult<StabilizationData> {
        StabilizationData::from_dense(&self.smoothed, &self.transforms)
    }
}

/// Runs the full analysis pipeline over a [`FrameSource`].
#[derive(Debug, Clone)]
pub struct StabilizationAnalyzer<P = NativePrimitives> {
    tracker: FrameTracker<P>,
    smoother: TrajectorySmoother,
}

impl StabilizationAnalyzer<NativePrimitives> {
    pub fn new(defaults: &StabilizationDefaults) -> SteadyResult<Self> {
        defaults.validate()?;
        let tracker = FrameTracker::new(&TrackerConfig::from(defaults))?;
        let smoother = TrajectorySmoother::new(defaults.smoothing_window)?;
        Ok(Self { tracker, smoother })
    }
}

impl<P: MotionPrimitives> StabilizationAnalyzer<P> {
    pub fn with_parts(tracker: FrameTracker<P>, smoother: TrajectorySmoother) -> Self {
        Self { tracker, smoother }
    }

    pub fn smoother(&self) -> &TrajectorySmoother {
        &self.smoother
    }

    pub fn run<S: FrameSource + ?Sized>(&self, source: &S) -> SteadyResult<AnalysisOutput> {
        self.run_with_progress(source, None)
    }

    /// Analyze the whole clip, reporting progress after each frame.
    ///
    /// A clip with fewer than two frames yields empty tables.
    pub fn run_with_progress<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        progress: Option<ProgressCallback>,
    ) -> SteadyResult<AnalysisOutput> {
        let total_frames = source.frame_count();
        tracing::info!(
            total_frames,
            window = self.smoother.window(),
            fallback = ?self.tracker.fallback(),
            "Starting stabilization analysis"
        );

        let mut state = TrackerState::new();
        let mut deltas = Vec::with_capacity(total_frames.saturating_sub(1));
        let mut fallback_frames = Vec::new();

        for index in 0..total_frames {
            let gray = source.gray_frame(index)?;
            let (next, step) = self.tracker.track(state, gray);
            state = next;

            if let Some(delta) = step.delta {
                if step.fell_back {
                    fallback_frames.push(deltas.len());
                }
                tracing::debug!(
                    frame = index,
                    dx = delta.dx,
                    dy = delta.dy,
                    da = delta.da,
                    "Tracked frame"
                );
                deltas.push(delta);
            }

            if let Some(callback) = &progress {
                callback(AnalysisProgress {
                    progress: (index + 1) as f64 / total_frames as f64,
                    frames_processed: index + 1,
                    total_frames,
                });
            }
        }

        let mut output = self.from_deltas(deltas)?;
        output.fallback_frames = fallback_frames;

        tracing::info!(
            deltas = output.deltas.len(),
            fallbacks = output.fallback_frames.len(),
            "Stabilization analysis complete"
        );
        Ok(output)
    }

    /// Integrate, smooth and synthesize from already-estimated motion.
    pub fn from_deltas(&self, deltas: Vec<MotionDelta>) -> SteadyResult<AnalysisOutput> {
        let trajectory = accumulate(&deltas);
        let smoothed = self.smoother.smooth(&trajectory);
        let transforms = synthesize(&deltas, &smoothed)?;
        Ok(AnalysisOutput {
            deltas,
            trajectory,
            smoothed,
            transforms,
            fallback_frames: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use steadyframe_common::error::SteadyError;

    struct FlatClip {
        frames: usize,
        broken: Option<usize>,
    }

    impl FrameSource for FlatClip {
        fn frame_count(&self) -> usize {
            self.frames
        }

        fn gray_frame(&self, index: usize) -> SteadyResult<GrayImage> {
            if Some(index) == self.broken {
                return Err(SteadyError::image(format!("frame {index} is unreadable")));
            }
            Ok(GrayImage::from_pixel(64, 48, Luma([90])))
        }
    }

    fn analyzer(window: i64) -> StabilizationAnalyzer {
        let defaults = StabilizationDefaults {
            smoothing_window: window,
            ..Default::default()
        };
        StabilizationAnalyzer::new(&defaults).unwrap()
    }

    #[test]
    fn test_single_frame_clip_is_empty() {
        let output = analyzer(30)
            .run(&FlatClip {
                frames: 1,
                broken: None,
            })
            .unwrap();
        assert!(output.deltas.is_empty());
        assert!(output.transforms.is_empty());
        assert!(output.into_data().unwrap().is_empty());
    }

    #[test]
    fn test_featureless_clip_falls_back_every_frame() {
        let output = analyzer(2)
            .run(&FlatClip {
                frames: 5,
                broken: None,
            })
            .unwrap();

        assert_eq!(output.deltas.len(), 4);
        assert_eq!(output.fallback_frames, vec![0, 1, 2, 3]);
        for delta in &output.deltas {
            assert_eq!(*delta, MotionDelta::ZERO);
        }
    }

    #[test]
    fn test_source_error_propagates() {
        let result = analyzer(2).run(&FlatClip {
            frames: 4,
            broken: Some(2),
        });
        assert!(matches!(result, Err(SteadyError::Image { .. })));
    }

    #[test]
    fn test_progress_reaches_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |p: AnalysisProgress| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(p.progress > 0.0 && p.progress <= 1.0);
            assert_eq!(p.total_frames, 3);
        });

        analyzer(1)
            .run_with_progress(
                &FlatClip {
                    frames: 3,
                    broken: None,
                },
                Some(callback),
            )
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_from_deltas_keys_by_delta_index() {
        let deltas = vec![MotionDelta::new(1.0, 0.0, 0.0); 3];
        let data = analyzer(1).from_deltas(deltas).unwrap().into_data().unwrap();
        assert_eq!(data.frame_range(), Some((0, 2)));
    }

    #[test]
    fn test_invalid_defaults_rejected() {
        let defaults = StabilizationDefaults {
            smoothing_window: -3,
            ..Default::default()
        };
        assert!(StabilizationAnalyzer::new(&defaults).is_err());
    }
}
