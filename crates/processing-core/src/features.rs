//! Salient point detection (Shi-Tomasi "good features to track").

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::Point2;
use rayon::prelude::*;

/// Sobel responses are 8x the central-difference derivative.
const SOBEL_NORMALIZATION: f32 = 1.0 / 8.0;

#[derive(Debug, Clone, Copy)]
pub struct CornerDetectorConfig {
    /// Upper bound on the number of corners returned.
    pub max_corners: usize,
    /// Minimum response, as a fraction of the strongest response.
    pub quality_level: f32,
    /// Minimum Euclidean distance between returned corners (pixels).
    pub min_distance: f32,
    /// Corners closer than this to an image edge are ignored (pixels).
    pub border: u32,
}

impl Default for CornerDetectorConfig {
    fn default() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.01,
            min_distance: 30.0,
            border: 11,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CornerDetector {
    config: CornerDetectorConfig,
}

impl CornerDetector {
    pub fn new(config: CornerDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CornerDetectorConfig {
        &self.config
    }

    /// Detect corners, strongest first.
    ///
    /// The response is the minimum eigenvalue of the 3x3 structure tensor
    /// of the image gradients. Candidates must be 3x3 local maxima above
    /// `quality_level * max_response`; they are then accepted greedily in
    /// decreasing response order while keeping `min_distance` apart.
    pub fn detect(&self, gray: &GrayImage) -> Vec<Point2<f32>> {
        let (width, height) = gray.dimensions();
        let border = self.config.border.max(1);
        if self.config.max_corners == 0 || width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        let response = min_eigen_response(gray);
        let w = width as usize;

        let max_response = response.iter().copied().fold(0.0f32, f32::max);
        if max_response <= 0.0 {
            return Vec::new();
        }
        let threshold = max_response * self.config.quality_level;

        let mut candidates: Vec<(f32, u32, u32)> = Vec::new();
        for y in border..height - border {
            for x in border..width - border {
                let value = response[y as usize * w + x as usize];
                if value < threshold || value <= 0.0 {
                    continue;
                }
                if is_local_maximum(&response, w, x as usize, y as usize, value) {
                    candidates.push((value, x, y));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_distance_sq = self.config.min_distance * self.config.min_distance;
        let mut corners: Vec<Point2<f32>> = Vec::with_capacity(self.config.max_corners);
        for (_, x, y) in candidates {
            let candidate = Point2::new(x as f32, y as f32);
            let too_close = corners
                .iter()
                .any(|c| (c - candidate).norm_squared() < min_distance_sq);
            if too_close {
                continue;
            }
            corners.push(candidate);
            if corners.len() >= self.config.max_corners {
                break;
            }
        }

        corners
    }
}

/// Per-pixel minimum eigenvalue of the 3x3 structure tensor.
///
/// Edge rows and columns are left at zero.
fn min_eigen_response(gray: &GrayImage) -> Vec<f32> {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);

    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let mut ixx = vec![0.0f32; w * h];
    let mut iyy = vec![0.0f32; w * h];
    let mut ixy = vec![0.0f32; w * h];
    for (i, (dx, dy)) in gx.pixels().zip(gy.pixels()).enumerate() {
        let dx = dx.0[0] as f32 * SOBEL_NORMALIZATION;
        let dy = dy.0[0] as f32 * SOBEL_NORMALIZATION;
        ixx[i] = dx * dx;
        iyy[i] = dy * dy;
        ixy[i] = dx * dy;
    }

    let mut response = vec![0.0f32; w * h];
    response
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            if y == 0 || y + 1 >= h {
                return;
            }
            for x in 1..w.saturating_sub(1) {
                let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
                for ny in y - 1..=y + 1 {
                    let base = ny * w;
                    for nx in x - 1..=x + 1 {
                        sxx += ixx[base + nx];
                        syy += iyy[base + nx];
                        sxy += ixy[base + nx];
                    }
                }
                let trace = sxx + syy;
                let discriminant = ((sxx - syy) * (sxx - syy) + 4.0 * sxy * sxy).sqrt();
                row[x] = (0.5 * (trace - discriminant)).max(0.0);
            }
        });

    response
}

fn is_local_maximum(response: &[f32], w: usize, x: usize, y: usize, value: f32) -> bool {
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) != (x, y) && response[ny * w + nx] > value {
                return false;
            }
        }
    }
    true
}
