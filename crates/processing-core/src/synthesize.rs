//! Corrective transform synthesis.

use steadyframe_common::error::{SteadyError, SteadyResult};
use steadyframe_stabilization_model::{CameraTrajectory, CorrectiveTransform, MotionDelta};

/// Per-frame transforms that move each frame onto the smoothed path.
///
/// The raw trajectory is re-integrated from `deltas` in lockstep; each
/// transform is the raw delta plus `smoothed[i] - raw[i]`. Every delta
/// needs a smoothed point at the same index; a missing one is an error
/// rather than a silent zero.
pub fn synthesize(
    deltas: &[MotionDelta],
    smoothed: &[CameraTrajectory],
) -> SteadyResult<Vec<CorrectiveTransform>> {
    let mut pose = CameraTrajectory::ORIGIN;
    let mut transforms = Vec::with_capacity(deltas.len());

    for (index, &delta) in deltas.iter().enumerate() {
        pose = pose + delta;
        let target = smoothed
            .get(index)
            .ok_or_else(|| SteadyError::missing_frame(index as u64))?;
        transforms.push(CorrectiveTransform::from_delta_and_offset(delta, *target - pose));
    }

    if smoothed.len() > deltas.len() {
        tracing::debug!(
            deltas = deltas.len(),
            smoothed = smoothed.len(),
            "Ignoring smoothed points past the last delta"
        );
    }

    Ok(transforms)
}
