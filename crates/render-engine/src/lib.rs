//! SteadyFrame Render Engine
//!
//! Applies stabilization data to frames and exports stabilized image
//! sequences.
//!
//! # Pipeline Architecture
//!
//! ```text
//! frames/0001.png ──┐
//!                   ├── Corrective warp (per-frame dx, dy, da)
//! stabilization ────┘         │
//!                             ├── Border-hiding zoom about the centre
//!                             ▼
//!                      out/0001.png
//! ```

pub mod export;
pub mod sequence;
pub mod stabilizer;

pub use export::*;
pub use sequence::ImageSequence;
pub use stabilizer::Stabilizer;
