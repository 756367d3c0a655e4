//! SteadyFrame Processing Core — Stabilization Analysis
//!
//! Turns a sequence of frames into stabilization data:
//! - **Tracking:** Estimate rigid motion between consecutive grayscale frames
//! - **Trajectory:** Integrate motion into a camera path and smooth it
//! - **Synthesis:** Derive the per-frame transform that follows the smooth path
//!
//! This crate is pure computation. Frames come in through [`FrameSource`];
//! the result is a [`steadyframe_stabilization_model::StabilizationData`]
//! value that the caller persists.

pub mod analysis;
pub mod features;
pub mod optical_flow;
pub mod primitives;
pub mod rigid;
pub mod synthesize;
pub mod tracker;
pub mod trajectory;

pub use analysis::{AnalysisOutput, FrameSource, StabilizationAnalyzer};
pub use primitives::{MotionPrimitives, NativePrimitives};
pub use tracker::{FallbackPolicy, FrameTracker, TrackerConfig, TrackerState};
pub use trajectory::{accumulate, TrajectorySmoother};
