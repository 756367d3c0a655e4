//! Stabilization data: what the analysis pass hands to the rendering pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steadyframe_common::error::{SteadyError, SteadyResult};

use crate::motion::{CameraTrajectory, CorrectiveTransform};

/// Smoothed trajectory and corrective transform for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStabilization {
    /// Smoothed camera trajectory at this frame.
    pub trajectory: CameraTrajectory,
    /// Transform that moves this frame onto the smoothed trajectory.
    pub transform: CorrectiveTransform,
}

/// Smoothed trajectory and corrective transforms keyed by frame index.
///
/// Both tables always share the same key set, which is why they are held
/// as one map. Keys are explicit so that a stabilization data file with
/// gaps (untracked frames) can still be represented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilizationData {
    frames: BTreeMap<u64, FrameStabilization>,

    /// Wall-clock time the data was last written, if known.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StabilizationData {
    /// Empty data set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from dense per-frame tables produced by one analysis run.
    ///
    /// Entry `i` of each slice belongs to frame index `i`.
    pub fn from_dense(
        smoothed: &[CameraTrajectory],
        transforms: &[CorrectiveTransform],
    ) -> SteadyResult<Self> {
        if smoothed.len() != transforms.len() {
            return Err(SteadyError::processing(format!(
                "smoothed trajectory has {} frames but {} corrective transforms were given",
                smoothed.len(),
                transforms.len()
            )));
        }

        let frames = smoothed
            .iter()
            .zip(transforms)
            .enumerate()
            .map(|(i, (&trajectory, &transform))| {
                (
                    i as u64,
                    FrameStabilization {
                        trajectory,
                        transform,
                    },
                )
            })
            .collect();

        Ok(Self {
            frames,
            last_updated: None,
        })
    }

    /// Insert or replace the data for one frame.
    pub fn insert(
        &mut self,
        frame_index: u64,
        trajectory: CameraTrajectory,
        transform: CorrectiveTransform,
    ) -> Option<FrameStabilization> {
        self.frames.insert(
            frame_index,
            FrameStabilization {
                trajectory,
                transform,
            },
        )
    }

    /// Corrective transform for a frame.
    ///
    /// A missing frame is an error: substituting a default transform would
    /// hide an inconsistency between the data file and the clip.
    pub fn transform(&self, frame_index: u64) -> SteadyResult<&CorrectiveTransform> {
        self.frames
            .get(&frame_index)
            .map(|f| &f.transform)
            .ok_or_else(|| SteadyError::missing_frame(frame_index))
    }

    /// Smoothed trajectory for a frame, if present.
    pub fn trajectory(&self, frame_index: u64) -> Option<&CameraTrajectory> {
        self.frames.get(&frame_index).map(|f| &f.trajectory)
    }

    pub fn get(&self, frame_index: u64) -> Option<&FrameStabilization> {
        self.frames.get(&frame_index)
    }

    /// Frames in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &FrameStabilization)> {
        self.frames.iter().map(|(&i, f)| (i, f))
    }

    /// Smoothed trajectory table in ascending index order.
    pub fn smoothed_trajectory(&self) -> impl Iterator<Item = (u64, &CameraTrajectory)> {
        self.frames.iter().map(|(&i, f)| (i, &f.trajectory))
    }

    /// Corrective transform table in ascending index order.
    pub fn transforms(&self) -> impl Iterator<Item = (u64, &CorrectiveTransform)> {
        self.frames.iter().map(|(&i, f)| (i, &f.transform))
    }

    /// First and last frame index, if any.
    pub fn frame_range(&self) -> Option<(u64, u64)> {
        let first = *self.frames.keys().next()?;
        let last = *self.frames.keys().next_back()?;
        Some((first, last))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every frame and the timestamp.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.last_updated = None;
    }
}
