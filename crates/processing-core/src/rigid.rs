//! Rigid 2D transform estimation (rotation + translation, no scale).

use nalgebra::{Matrix2x3, Point2, Vector2};

/// Row-major 2x3 affine transform `[r00 r01 tx; r10 r11 ty]` mapping a
/// previous-frame point to its current-frame position.
pub type AffineTransform = Matrix2x3<f64>;

/// The transform that leaves every point where it is.
pub fn identity_transform() -> AffineTransform {
    rigid_transform(0.0, 0.0, 0.0)
}

/// Rotation by `angle` radians followed by translation `(tx, ty)`.
pub fn rigid_transform(angle: f64, tx: f64, ty: f64) -> AffineTransform {
    let (sin, cos) = angle.sin_cos();
    Matrix2x3::new(cos, -sin, tx, sin, cos, ty)
}

#[derive(Debug, Clone, Copy)]
pub struct RigidEstimatorConfig {
    /// Fewest point pairs a fit is attempted with.
    pub min_correspondences: usize,
    /// Pairs whose residual after the first fit exceeds this (pixels) are
    /// dropped before refitting.
    pub inlier_threshold: f64,
}

impl Default for RigidEstimatorConfig {
    fn default() -> Self {
        Self {
            min_correspondences: 3,
            inlier_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RigidEstimator {
    config: RigidEstimatorConfig,
}

impl RigidEstimator {
    pub fn new(config: RigidEstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RigidEstimatorConfig {
        &self.config
    }

    /// Best-fit rigid transform mapping `from[i]` onto `to[i]`.
    ///
    /// Returns `None` when there are too few pairs, the slices differ in
    /// length, or the points are degenerate (all coincident).
    pub fn estimate(&self, from: &[Point2<f32>], to: &[Point2<f32>]) -> Option<AffineTransform> {
        let min = self.config.min_correspondences.max(2);
        if from.len() != to.len() || from.len() < min {
            return None;
        }

        let pairs: Vec<(Vector2<f64>, Vector2<f64>)> = from
            .iter()
            .zip(to)
            .map(|(p, q)| (p.coords.cast::<f64>(), q.coords.cast::<f64>()))
            .collect();

        let first = fit_rigid(&pairs)?;

        let threshold_sq = self.config.inlier_threshold * self.config.inlier_threshold;
        let inliers: Vec<(Vector2<f64>, Vector2<f64>)> = pairs
            .iter()
            .copied()
            .filter(|&(p, q)| (first * p.push(1.0) - q).norm_squared() <= threshold_sq)
            .collect();

        if inliers.len() >= min && inliers.len() < pairs.len() {
            Some(fit_rigid(&inliers).unwrap_or(first))
        } else {
            Some(first)
        }
    }
}

/// Closed-form least-squares rotation + translation.
///
/// With both point sets centred on their centroids, the optimal angle is
/// `atan2(Σ p×q, Σ p·q)` and the translation maps the rotated source
/// centroid onto the target centroid.
fn fit_rigid(pairs: &[(Vector2<f64>, Vector2<f64>)]) -> Option<AffineTransform> {
    if pairs.is_empty() {
        return None;
    }

    let n = pairs.len() as f64;
    let (sum_p, sum_q) = pairs
        .iter()
        .fold((Vector2::<f64>::zeros(), Vector2::<f64>::zeros()), |(sp, sq), (p, q)| {
            (sp + p, sq + q)
        });
    let centroid_p: Vector2<f64> = sum_p / n;
    let centroid_q: Vector2<f64> = sum_q / n;

    let (mut dot, mut cross) = (0.0, 0.0);
    for (p, q) in pairs {
        let p = p - centroid_p;
        let q = q - centroid_q;
        dot += p.dot(&q);
        cross += p.x * q.y - p.y * q.x;
    }
    if dot.abs() + cross.abs() < 1e-12 {
        return None;
    }

    let angle = cross.atan2(dot);
    let (sin, cos) = angle.sin_cos();
    let rotated_centroid = Vector2::new(
        cos * centroid_p.x - sin * centroid_p.y,
        sin * centroid_p.x + cos * centroid_p.y,
    );
    let translation = centroid_q - rotated_centroid;

    Some(rigid_transform(angle, translation.x, translation.y))
}
