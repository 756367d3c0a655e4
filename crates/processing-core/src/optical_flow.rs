//! Sparse pyramidal Lucas-Kanade optical flow.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Primitive};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

/// Sobel responses are 8x the central-difference derivative.
const SOBEL_NORMALIZATION: f32 = 1.0 / 8.0;

#[derive(Debug, Clone, Copy)]
pub struct LucasKanadeConfig {
    /// Half-size of the square integration window (21x21 for radius 10).
    pub window_radius: usize,
    /// Number of pyramid levels above full resolution.
    pub max_level: usize,
    pub max_iterations: usize,
    /// Stop iterating once the update is shorter than this (pixels).
    pub epsilon: f32,
    /// Minimum per-pixel eigenvalue of the window's structure tensor.
    /// Flatter windows cannot be tracked.
    pub min_eigen_threshold: f32,
}

impl Default for LucasKanadeConfig {
    fn default() -> Self {
        Self {
            window_radius: 10,
            max_level: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen_threshold: 1e-2,
        }
    }
}

/// Where a point ended up in the next frame, and whether it was tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    pub position: Point2<f32>,
    /// `false` when the point could not be followed; `position` is then
    /// meaningless.
    pub status: bool,
}

struct TemplateLevel {
    image: GrayImage,
    grad_x: ImageBuffer<Luma<i16>, Vec<i16>>,
    grad_y: ImageBuffer<Luma<i16>, Vec<i16>>,
}

#[derive(Debug, Clone)]
pub struct PyramidalLk {
    config: LucasKanadeConfig,
}

impl PyramidalLk {
    pub fn new(config: LucasKanadeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LucasKanadeConfig {
        &self.config
    }

    /// Follow `points` from `previous` into `current`.
    ///
    /// The output has one entry per input point, in the same order.
    pub fn track(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        points: &[Point2<f32>],
    ) -> Vec<FlowPoint> {
        if points.is_empty() {
            return Vec::new();
        }
        let (width, height) = current.dimensions();
        if previous.dimensions() != current.dimensions() || width == 0 || height == 0 {
            return points
                .iter()
                .map(|&position| FlowPoint {
                    position,
                    status: false,
                })
                .collect();
        }

        let min_size = (2 * self.config.window_radius + 1) as u32;
        let previous_levels: Vec<TemplateLevel> =
            build_pyramid(previous, self.config.max_level, min_size)
                .into_iter()
                .map(|image| TemplateLevel {
                    grad_x: horizontal_sobel(&image),
                    grad_y: vertical_sobel(&image),
                    image,
                })
                .collect();
        let current_levels = build_pyramid(current, self.config.max_level, min_size);

        points
            .par_iter()
            .map(|&point| match self.track_point(&previous_levels, &current_levels, point) {
                Some(position) if within_image(position, width, height) => FlowPoint {
                    position,
                    status: true,
                },
                _ => FlowPoint {
                    position: point,
                    status: false,
                },
            })
            .collect()
    }

    fn track_point(
        &self,
        previous: &[TemplateLevel],
        current: &[GrayImage],
        point: Point2<f32>,
    ) -> Option<Point2<f32>> {
        let levels = previous.len().min(current.len());
        let mut guess = Vector2::zeros();

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let level_point = point.coords * scale;
            let flow = self.refine(&previous[level], &current[level], level_point, guess)?;
            if level == 0 {
                return Some(point + flow);
            }
            guess = flow * 2.0;
        }
        None
    }

    /// Iterative Lucas-Kanade refinement on one pyramid level.
    ///
    /// Solves `G * delta = b` with `G` the structure tensor of the template
    /// window and `b` the gradient-weighted intensity mismatch, until the
    /// update falls below `epsilon`. Returns the total displacement.
    fn refine(
        &self,
        template: &TemplateLevel,
        current: &GrayImage,
        point: Vector2<f32>,
        initial: Vector2<f32>,
    ) -> Option<Vector2<f32>> {
        let radius = self.config.window_radius as i32;
        let side = (2 * radius + 1) as usize;

        let mut window = Vec::with_capacity(side * side);
        let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = point.x + dx as f32;
                let y = point.y + dy as f32;
                let ix = sample_bilinear(&template.grad_x, x, y) * SOBEL_NORMALIZATION;
                let iy = sample_bilinear(&template.grad_y, x, y) * SOBEL_NORMALIZATION;
                let value = sample_bilinear(&template.image, x, y);
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                window.push((dx as f32, dy as f32, ix, iy, value));
            }
        }

        let area = window.len() as f32;
        let min_eigen =
            (gxx + gyy - ((gxx - gyy) * (gxx - gyy) + 4.0 * gxy * gxy).sqrt()) / (2.0 * area);
        let determinant = gxx * gyy - gxy * gxy;
        if min_eigen < self.config.min_eigen_threshold || determinant.abs() <= f32::EPSILON {
            return None;
        }

        let epsilon_sq = self.config.epsilon * self.config.epsilon;
        let mut flow = initial;
        for _ in 0..self.config.max_iterations {
            let (mut bx, mut by) = (0.0f32, 0.0f32);
            for &(dx, dy, ix, iy, value) in &window {
                let target = sample_bilinear(
                    current,
                    point.x + flow.x + dx,
                    point.y + flow.y + dy,
                );
                let mismatch = value - target;
                bx += mismatch * ix;
                by += mismatch * iy;
            }

            let delta = Vector2::new(
                (gyy * bx - gxy * by) / determinant,
                (gxx * by - gxy * bx) / determinant,
            );
            if !delta.x.is_finite() || !delta.y.is_finite() {
                return None;
            }
            flow += delta;
            if delta.norm_squared() < epsilon_sq {
                break;
            }
        }

        Some(flow)
    }
}

/// Gaussian-ish image pyramid, finest level first.
///
/// Stops early once a level would be smaller than `min_size` on either side.
fn build_pyramid(image: &GrayImage, max_level: usize, min_size: u32) -> Vec<GrayImage> {
    let mut levels = vec![image.clone()];
    for _ in 0..max_level {
        let finer = &levels[levels.len() - 1];
        let (width, height) = (finer.width() / 2, finer.height() / 2);
        if width < min_size || height < min_size {
            break;
        }
        let coarser = imageops::resize(finer, width, height, FilterType::Triangle);
        levels.push(coarser);
    }
    levels
}

/// Bilinear sample with coordinates clamped to the image (edge pixels
/// replicate outward).
fn sample_bilinear<T>(image: &ImageBuffer<Luma<T>, Vec<T>>, x: f32, y: f32) -> f32
where
    T: Primitive + Into<f32>,
{
    let (width, height) = image.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p = |px: u32, py: u32| -> f32 { image.get_pixel(px, py).0[0].into() };
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

fn within_image(point: Point2<f32>, width: u32, height: u32) -> bool {
    point.x.is_finite()
        && point.y.is_finite()
        && point.x >= 0.0
        && point.y >= 0.0
        && point.x <= (width - 1) as f32
        && point.y <= (height - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth, non-periodic texture evaluated at a sub-pixel offset.
    pub(crate) fn texture(width: u32, height: u32, shift_x: f32, shift_y: f32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let u = x as f32 - shift_x;
            let v = y as f32 - shift_y;
            let value = 128.0
                + 50.0 * (u / 9.0).sin() * (v / 11.0).cos()
                + 30.0 * ((u + 2.0 * v) / 17.0).sin()
                + 20.0 * ((u * v) / 900.0).cos();
            Luma([value.clamp(0.0, 255.0) as u8])
        })
    }

    #[test]
    fn test_recovers_small_translation() {
        let previous = texture(160, 120, 0.0, 0.0);
        let current = texture(160, 120, 2.0, -1.0);
        let points = vec![
            Point2::new(50.0, 40.0),
            Point2::new(80.0, 60.0),
            Point2::new(110.0, 70.0),
        ];

        let flow = PyramidalLk::new(LucasKanadeConfig::default()).track(&previous, &current, &points);

        assert_eq!(flow.len(), points.len());
        for (start, tracked) in points.iter().zip(&flow) {
            assert!(tracked.status);
            let moved = tracked.position - start;
            assert!((moved.x - 2.0).abs() < 0.5, "dx = {}", moved.x);
            assert!((moved.y + 1.0).abs() < 0.5, "dy = {}", moved.y);
        }
    }

    #[test]
    fn test_flat_window_is_not_tracked() {
        let flat = GrayImage::from_pixel(80, 80, Luma([100]));
        let flow = PyramidalLk::new(LucasKanadeConfig::default()).track(
            &flat,
            &flat,
            &[Point2::new(40.0, 40.0)],
        );
        assert_eq!(flow.len(), 1);
        assert!(!flow[0].status);
    }

    #[test]
    fn test_mismatched_sizes_track_nothing() {
        let a = texture(64, 64, 0.0, 0.0);
        let b = texture(80, 64, 0.0, 0.0);
        let flow = PyramidalLk::new(LucasKanadeConfig::default()).track(
            &a,
            &b,
            &[Point2::new(30.0, 30.0)],
        );
        assert!(!flow[0].status);
    }

    #[test]
    fn test_pyramid_stops_at_min_size() {
        let image = texture(100, 60, 0.0, 0.0);
        let levels = build_pyramid(&image, 5, 21);
        // 100x60 -> 50x30 -> (25x15 is too small)
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].dimensions(), (50, 30));
    }

    #[test]
    fn test_bilinear_midpoint() {
        let image = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 200 }]));
        assert!((sample_bilinear(&image, 0.5, 0.0) - 100.0).abs() < 1e-4);
        assert!((sample_bilinear(&image, 5.0, 0.0) - 200.0).abs() < 1e-4);
    }
}
