//! Frame-to-frame rigid motion tracking.
//!
//! The tracker is a pure step function over an explicit [`TrackerState`]:
//! feed it the carried state and the next grayscale frame, get back the new
//! state and what happened on this step. Nothing is cached inside the
//! tracker itself, so one tracker can drive any number of clips.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use steadyframe_common::config::StabilizationDefaults;
use steadyframe_common::error::{SteadyError, SteadyResult};
use steadyframe_stabilization_model::MotionDelta;

use crate::features::CornerDetectorConfig;
use crate::optical_flow::LucasKanadeConfig;
use crate::primitives::{MotionPrimitives, NativePrimitives};
use crate::rigid::{identity_transform, AffineTransform, RigidEstimatorConfig};

/// What to report when no rigid transform can be fitted for a frame pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Repeat the last successfully fitted transform.
    #[default]
    FreezeLastGood,
    /// Assume the camera did not move.
    Identity,
}

/// Tracker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    /// Fewer surviving point pairs than this triggers the fallback.
    pub min_correspondences: usize,
    pub fallback: FallbackPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from(&StabilizationDefaults::default())
    }
}

impl From<&StabilizationDefaults> for TrackerConfig {
    fn from(defaults: &StabilizationDefaults) -> Self {
        Self {
            max_corners: defaults.max_corners,
            quality_level: defaults.quality_level,
            min_distance: defaults.min_distance,
            min_correspondences: defaults.min_correspondences,
            fallback: FallbackPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> SteadyResult<()> {
        if self.max_corners == 0 {
            return Err(SteadyError::config("max_corners must be at least 1"));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(SteadyError::config(format!(
                "quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if self.min_distance < 0.0 {
            return Err(SteadyError::config("min_distance must be >= 0"));
        }
        if self.min_correspondences < 2 {
            return Err(SteadyError::config(
                "min_correspondences must be at least 2 to fit a rigid transform",
            ));
        }
        Ok(())
    }
}

/// State carried from one tracking step to the next.
#[derive(Debug, Clone)]
pub struct TrackerState {
    /// Grayscale copy of the last frame seen, `None` before the first frame.
    pub previous_gray: Option<GrayImage>,
    /// Transform reported for the last frame pair that fitted successfully.
    pub last_good: AffineTransform,
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            previous_gray: None,
            last_good: identity_transform(),
        }
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one tracking step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStep {
    /// Motion from the previous frame to this one. `None` for the first frame.
    pub delta: Option<MotionDelta>,
    /// Point pairs that survived optical flow.
    pub correspondences: usize,
    /// Whether the fallback policy supplied the transform.
    pub fell_back: bool,
}

/// Estimates rigid inter-frame motion from tracked feature points.
#[derive(Debug, Clone)]
pub struct FrameTracker<P = NativePrimitives> {
    primitives: P,
    max_corners: usize,
    min_correspondences: usize,
    fallback: FallbackPolicy,
}

impl FrameTracker<NativePrimitives> {
    /// Tracker backed by the native primitives.
    pub fn new(config: &TrackerConfig) -> SteadyResult<Self> {
        config.validate()?;
        let detector = CornerDetectorConfig {
            max_corners: config.max_corners,
            quality_level: config.quality_level,
            min_distance: config.min_distance,
            ..Default::default()
        };
        let rigid = RigidEstimatorConfig {
            min_correspondences: config.min_correspondences,
            ..Default::default()
        };
        let primitives = NativePrimitives::new(detector, LucasKanadeConfig::default(), rigid);
        Ok(Self::with_primitives(primitives, config))
    }
}

impl<P: MotionPrimitives> FrameTracker<P> {
    /// Tracker backed by custom primitives. `config` is not validated.
    pub fn with_primitives(primitives: P, config: &TrackerConfig) -> Self {
        Self {
            primitives,
            max_corners: config.max_corners,
            min_correspondences: config.min_correspondences,
            fallback: config.fallback,
        }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Advance by one frame.
    ///
    /// The first frame only seeds the state. Every later frame yields a
    /// delta; when the pair cannot be fitted the fallback policy decides
    /// what that delta is. Never fails.
    pub fn track(&self, state: TrackerState, current: GrayImage) -> (TrackerState, TrackStep) {
        let TrackerState {
            previous_gray,
            last_good,
        } = state;

        let Some(previous) = previous_gray else {
            let step = TrackStep {
                delta: None,
                correspondences: 0,
                fell_back: false,
            };
            let state = TrackerState {
                previous_gray: Some(current),
                last_good,
            };
            return (state, step);
        };

        let (fitted, correspondences) = self.estimate(&previous, &current);
        tracing::debug!(correspondences, "good optical flow");

        let (transform, last_good, fell_back) = match fitted {
            Some(transform) => (transform, transform, false),
            None => {
                let transform = match self.fallback {
                    FallbackPolicy::FreezeLastGood => last_good,
                    FallbackPolicy::Identity => identity_transform(),
                };
                tracing::warn!(
                    correspondences,
                    required = self.min_correspondences,
                    policy = ?self.fallback,
                    "Rigid fit failed, using fallback transform"
                );
                (transform, last_good, true)
            }
        };

        let step = TrackStep {
            delta: Some(decompose(&transform)),
            correspondences,
            fell_back,
        };
        let state = TrackerState {
            previous_gray: Some(current),
            last_good,
        };
        (state, step)
    }

    /// Fit the rigid transform between two frames.
    ///
    /// Returns the transform, if any, and the number of point pairs that
    /// survived optical flow.
    pub fn estimate(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> (Option<AffineTransform>, usize) {
        let points = self.primitives.detect(previous, self.max_corners);
        let flow = self.primitives.track(previous, current, &points);

        let (from, to): (Vec<_>, Vec<_>) = points
            .iter()
            .zip(&flow)
            .filter(|(_, tracked)| tracked.status)
            .map(|(&start, tracked)| (start, tracked.position))
            .unzip();

        let correspondences = from.len();
        if correspondences < self.min_correspondences {
            return (None, correspondences);
        }
        (self.primitives.estimate_rigid(&from, &to), correspondences)
    }
}

/// Translation and rotation angle of a rigid 2x3 transform.
pub fn decompose(transform: &AffineTransform) -> MotionDelta {
    MotionDelta {
        dx: transform[(0, 2)],
        dy: transform[(1, 2)],
        da: transform[(1, 0)].atan2(transform[(0, 0)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optical_flow::FlowPoint;
    use crate::rigid::rigid_transform;
    use image::Luma;
    use nalgebra::Point2;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Primitives that replay a fixed list of fit results.
    struct Scripted {
        fits: Mutex<VecDeque<Option<AffineTransform>>>,
        tracked: bool,
    }

    impl Scripted {
        fn new(fits: Vec<Option<AffineTransform>>) -> Self {
            Self {
                fits: Mutex::new(fits.into()),
                tracked: true,
            }
        }
    }

    impl MotionPrimitives for Scripted {
        fn detect(&self, _gray: &GrayImage, max_corners: usize) -> Vec<Point2<f32>> {
            (0..max_corners.min(8))
                .map(|i| Point2::new(10.0 * i as f32, 5.0))
                .collect()
        }

        fn track(
            &self,
            _previous: &GrayImage,
            _current: &GrayImage,
            points: &[Point2<f32>],
        ) -> Vec<FlowPoint> {
            points
                .iter()
                .map(|&position| FlowPoint {
                    position,
                    status: self.tracked,
                })
                .collect()
        }

        fn estimate_rigid(
            &self,
            _from: &[Point2<f32>],
            _to: &[Point2<f32>],
        ) -> Option<AffineTransform> {
            self.fits.lock().unwrap().pop_front().flatten()
        }
    }

    fn frame() -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([0]))
    }

    fn assert_delta(delta: MotionDelta, dx: f64, dy: f64, da: f64) {
        assert!((delta.dx - dx).abs() < 1e-9, "dx {} != {dx}", delta.dx);
        assert!((delta.dy - dy).abs() < 1e-9, "dy {} != {dy}", delta.dy);
        assert!((delta.da - da).abs() < 1e-9, "da {} != {da}", delta.da);
    }

    #[test]
    fn test_first_frame_emits_nothing() {
        let tracker = FrameTracker::with_primitives(Scripted::new(vec![]), &TrackerConfig::default());
        let (state, step) = tracker.track(TrackerState::new(), frame());

        assert!(step.delta.is_none());
        assert!(!step.fell_back);
        assert!(state.previous_gray.is_some());
        assert_eq!(state.last_good, identity_transform());
    }

    #[test]
    fn test_successful_fit_is_decomposed() {
        let fit = rigid_transform(0.1, 3.0, -2.0);
        let tracker =
            FrameTracker::with_primitives(Scripted::new(vec![Some(fit)]), &TrackerConfig::default());

        let (state, _) = tracker.track(TrackerState::new(), frame());
        let (state, step) = tracker.track(state, frame());

        assert_delta(step.delta.unwrap(), 3.0, -2.0, 0.1);
        assert_eq!(step.correspondences, 8);
        assert!(!step.fell_back);
        assert_eq!(state.last_good, fit);
    }

    #[test]
    fn test_failed_fit_freezes_last_good() {
        let fit = rigid_transform(-0.02, 1.5, 0.5);
        let tracker = FrameTracker::with_primitives(
            Scripted::new(vec![Some(fit), None, None]),
            &TrackerConfig::default(),
        );

        let (mut state, _) = tracker.track(TrackerState::new(), frame());
        let mut steps = Vec::new();
        for _ in 0..3 {
            let (next, step) = tracker.track(state, frame());
            state = next;
            steps.push(step);
        }

        assert!(!steps[0].fell_back);
        for step in &steps[1..] {
            assert!(step.fell_back);
            assert_delta(step.delta.unwrap(), 1.5, 0.5, -0.02);
        }
        assert_eq!(state.last_good, fit);
    }

    #[test]
    fn test_failure_before_any_fit_reports_zero_motion() {
        let tracker =
            FrameTracker::with_primitives(Scripted::new(vec![None]), &TrackerConfig::default());
        let (state, _) = tracker.track(TrackerState::new(), frame());
        let (_, step) = tracker.track(state, frame());

        assert!(step.fell_back);
        assert_delta(step.delta.unwrap(), 0.0, 0.0, 0.0);
    }

    #[test]
    fn test_identity_policy_ignores_last_good() {
        let config = TrackerConfig {
            fallback: FallbackPolicy::Identity,
            ..Default::default()
        };
        let fit = rigid_transform(0.0, 4.0, 4.0);
        let tracker = FrameTracker::with_primitives(Scripted::new(vec![Some(fit), None]), &config);

        let (state, _) = tracker.track(TrackerState::new(), frame());
        let (state, _) = tracker.track(state, frame());
        let (state, step) = tracker.track(state, frame());

        assert!(step.fell_back);
        assert_delta(step.delta.unwrap(), 0.0, 0.0, 0.0);
        assert_eq!(state.last_good, fit);
    }

    #[test]
    fn test_lost_points_trigger_fallback() {
        let mut primitives = Scripted::new(vec![Some(rigid_transform(0.0, 9.0, 9.0))]);
        primitives.tracked = false;
        let tracker = FrameTracker::with_primitives(primitives, &TrackerConfig::default());

        let (state, _) = tracker.track(TrackerState::new(), frame());
        let (_, step) = tracker.track(state, frame());

        assert_eq!(step.correspondences, 0);
        assert!(step.fell_back);
        assert_delta(step.delta.unwrap(), 0.0, 0.0, 0.0);
    }

    #[test]
    fn test_decompose_keeps_full_angle_range() {
        let delta = decompose(&rigid_transform(3.0, 0.0, 0.0));
        assert!((delta.da - 3.0).abs() < 1e-12);
        let delta = decompose(&rigid_transform(-3.0, 0.0, 0.0));
        assert!((delta.da + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TrackerConfig {
            min_correspondences: 1,
            ..Default::default()
        };
        assert!(FrameTracker::new(&config).is_err());

        let config = TrackerConfig {
            max_corners: 0,
            ..Default::default()
        };
        assert!(FrameTracker::new(&config).is_err());
    }
}
