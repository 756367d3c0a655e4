//! Image-processing primitives the frame tracker is built on.
//!
//! The tracker only needs three operations: find trackable points, follow
//! them into the next frame, and fit a rigid transform to the pairs. They
//! sit behind [`MotionPrimitives`] so the tracker can be driven by a
//! different backend, or by a scripted one in tests.

use image::GrayImage;
use nalgebra::Point2;

use crate::features::{CornerDetector, CornerDetectorConfig};
use crate::optical_flow::{FlowPoint, LucasKanadeConfig, PyramidalLk};
use crate::rigid::{AffineTransform, RigidEstimator, RigidEstimatorConfig};

/// Feature detection, sparse optical flow and rigid fitting.
pub trait MotionPrimitives: Send + Sync {
    /// Up to `max_corners` salient points, strongest first.
    fn detect(&self, gray: &GrayImage, max_corners: usize) -> Vec<Point2<f32>>;

    /// Positions of `points` in `current`, one entry per input point.
    fn track(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        points: &[Point2<f32>],
    ) -> Vec<FlowPoint>;

    /// Rigid transform mapping `from[i]` onto `to[i]`, if one can be fitted.
    fn estimate_rigid(&self, from: &[Point2<f32>], to: &[Point2<f32>])
        -> Option<AffineTransform>;
}

/// Pure-Rust primitives: Shi-Tomasi corners, pyramidal Lucas-Kanade and a
/// closed-form rigid fit.
#[derive(Debug, Clone)]
pub struct NativePrimitives {
    detector: CornerDetectorConfig,
    flow: PyramidalLk,
    rigid: RigidEstimator,
}

impl NativePrimitives {
    pub fn new(
        detector: CornerDetectorConfig,
        flow: LucasKanadeConfig,
        rigid: RigidEstimatorConfig,
    ) -> Self {
        Self {
            detector,
            flow: PyramidalLk::new(flow),
            rigid: RigidEstimator::new(rigid),
        }
    }

    pub fn detector_config(&self) -> &CornerDetectorConfig {
        &self.detector
    }
}

impl Default for NativePrimitives {
    fn default() -> Self {
        Self::new(
            CornerDetectorConfig::default(),
            LucasKanadeConfig::default(),
            RigidEstimatorConfig::default(),
        )
    }
}

impl MotionPrimitives for NativePrimitives {
    fn detect(&self, gray: &GrayImage, max_corners: usize) -> Vec<Point2<f32>> {
        let config = CornerDetectorConfig {
            max_corners,
            ..self.detector
        };
        CornerDetector::new(config).detect(gray)
    }

    fn track(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        points: &[Point2<f32>],
    ) -> Vec<FlowPoint> {
        self.flow.track(previous, current, points)
    }

    fn estimate_rigid(
        &self,
        from: &[Point2<f32>],
        to: &[Point2<f32>],
    ) -> Option<AffineTransform> {
        self.rigid.estimate(from, to)
    }
}
