//! Rigid 2D motion types.
//!
//! Every type here is a translation `(x, y)` in pixels plus a rotation
//! angle in radians. Rotation/translation is all a rigid transform encodes;
//! scale and shear are never represented.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Estimated rigid motion from frame `i - 1` to frame `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionDelta {
    /// Horizontal translation (pixels).
    pub dx: f64,
    /// Vertical translation (pixels).
    pub dy: f64,
    /// Rotation (radians).
    pub da: f64,
}

impl MotionDelta {
    /// No motion at all.
    pub const ZERO: MotionDelta = MotionDelta {
        dx: 0.0,
        dy: 0.0,
        da: 0.0,
    };

    pub fn new(dx: f64, dy: f64, da: f64) -> Self {
        Self { dx, dy, da }
    }
}

/// Absolute camera position and orientation at a frame index.
///
/// Also used for the smoothed trajectory, which has the same shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraTrajectory {
    pub x: f64,
    pub y: f64,
    /// Accumulated angle (radians, unwrapped).
    pub a: f64,
}

impl CameraTrajectory {
    /// The conceptual origin every trajectory starts from.
    pub const ORIGIN: CameraTrajectory = CameraTrajectory {
        x: 0.0,
        y: 0.0,
        a: 0.0,
    };

    pub fn new(x: f64, y: f64, a: f64) -> Self {
        Self { x, y, a }
    }
}

/// Moves a trajectory point by one frame of motion.
impl Add<MotionDelta> for CameraTrajectory {
    type Output = CameraTrajectory;

    fn add(self, delta: MotionDelta) -> CameraTrajectory {
        CameraTrajectory {
            x: self.x + delta.dx,
            y: self.y + delta.dy,
            a: self.a + delta.da,
        }
    }
}

/// Component-wise offset between two trajectory points, as a motion.
impl Sub for CameraTrajectory {
    type Output = MotionDelta;

    fn sub(self, other: CameraTrajectory) -> MotionDelta {
        MotionDelta {
            dx: self.x - other.x,
            dy: self.y - other.y,
            da: self.a - other.a,
        }
    }
}

/// Per-frame transform that moves a frame onto the smoothed trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectiveTransform {
    pub dx: f64,
    pub dy: f64,
    pub da: f64,
}

impl CorrectiveTransform {
    pub fn new(dx: f64, dy: f64, da: f64) -> Self {
        Self { dx, dy, da }
    }

    /// Raw frame motion nudged by the offset between the smoothed and the
    /// raw trajectory at the same frame.
    pub fn from_delta_and_offset(raw: MotionDelta, offset: MotionDelta) -> Self {
        Self {
            dx: raw.dx + offset.dx,
            dy: raw.dy + offset.dy,
            da: raw.da + offset.da,
        }
    }

    /// Row-major `[cos -sin dx; sin cos dy]` forward mapping.
    pub fn affine_matrix(&self) -> [[f64; 3]; 2] {
        let (sin, cos) = self.da.sin_cos();
        [[cos, -sin, self.dx], [sin, cos, self.dy]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_plus_delta() {
        let t = CameraTrajectory::new(1.0, 2.0, 0.5) + MotionDelta::new(0.5, -1.0, 0.25);
        assert_eq!(t, CameraTrajectory::new(1.5, 1.0, 0.75));
    }

    #[test]
    fn test_angle_is_not_wrapped() {
        let mut t = CameraTrajectory::ORIGIN;
        for _ in 0..10 {
            t = t + MotionDelta::new(0.0, 0.0, 1.0);
        }
        assert!((t.a - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_trajectory_difference() {
        let d = CameraTrajectory::new(4.0, 1.0, 0.3) - CameraTrajectory::new(1.0, 1.5, 0.1);
        assert!((d.dx - 3.0).abs() < 1e-12);
        assert!((d.dy + 0.5).abs() < 1e-12);
        assert!((d.da - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_identity_affine_matrix() {
        let m = CorrectiveTransform::new(5.0, -2.0, 0.0).affine_matrix();
        assert_eq!(m, [[1.0, -0.0, 5.0], [0.0, 1.0, -2.0]]);
    }

    #[test]
    fn test_quarter_turn_affine_matrix() {
        let m = CorrectiveTransform::new(0.0, 0.0, std::f64::consts::FRAC_PI_2).affine_matrix();
        assert!(m[0][0].abs() < 1e-12);
        assert!((m[0][1] + 1.0).abs() < 1e-12);
        assert!((m[1][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_serialization_field_names() {
        let json = serde_json::to_string(&CorrectiveTransform::new(1.0, 2.0, 0.5)).unwrap();
        assert_eq!(json, r#"{"dx":1.0,"dy":2.0,"da":0.5}"#);
    }
}
