//! Camera trajectory integration and smoothing.

use rayon::prelude::*;
use steadyframe_common::error::{SteadyError, SteadyResult};
use steadyframe_stabilization_model::{CameraTrajectory, MotionDelta};

/// Running sum of per-frame motion, starting from the origin.
///
/// `result[i]` is the camera pose after applying `deltas[0..=i]`. Angles are
/// summed as-is and never wrapped.
pub fn accumulate(deltas: &[MotionDelta]) -> Vec<CameraTrajectory> {
    deltas
        .iter()
        .scan(CameraTrajectory::ORIGIN, |pose, &delta| {
            *pose = *pose + delta;
            Some(*pose)
        })
        .collect()
}

/// Centered moving average over a camera trajectory.
///
/// Each output point is the mean of the input points within `window`
/// frames on either side. Near the ends the window is truncated rather than
/// padded, so the divisor is the number of points actually summed.
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySmoother {
    window: usize,
}

impl TrajectorySmoother {
    /// Smoother with the given half-width. Negative widths are rejected.
    pub fn new(window: i64) -> SteadyResult<Self> {
        let window = usize::try_from(window).map_err(|_| {
            SteadyError::config(format!("smoothing window must be >= 0, got {window}"))
        })?;
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn smooth(&self, trajectory: &[CameraTrajectory]) -> Vec<CameraTrajectory> {
        let len = trajectory.len();
        (0..len)
            .into_par_iter()
            .map(|i| {
                let start = i.saturating_sub(self.window);
                let end = i.saturating_add(self.window).min(len - 1);
                mean(&trajectory[start..=end])
            })
            .collect()
    }
}

fn mean(points: &[CameraTrajectory]) -> CameraTrajectory {
    let (x, y, a) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(x, y, a), p| (x + p.x, y + p.y, a + p.a));
    let count = points.len() as f64;
    CameraTrajectory::new(x / count, y / count, a / count)
}
