//! SteadyFrame Stabilization Model
//!
//! Defines the data contracts shared by the analysis and rendering passes:
//! - **Motion:** Frame-to-frame rigid motion, absolute camera trajectory,
//!   and per-frame corrective transforms
//! - **Data:** The smoothed trajectory and corrective transforms keyed by
//!   frame index, which is all a rendering pass needs
//! - **Store:** The binary stabilization data file that carries that data
//!   between processes
//!
//! Angles are radians and are never wrapped: a long clip may accumulate
//! angles well outside `[-π, π]`.

pub mod data;
pub mod motion;
pub mod store;

pub use data::*;
pub use motion::*;
pub use store::{StoreError, STABILIZATION_FILE_EXTENSION};
