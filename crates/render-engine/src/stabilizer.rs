//! Per-frame stabilized rendering.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use steadyframe_common::error::{SteadyError, SteadyResult};
use steadyframe_stabilization_model::{CorrectiveTransform, StabilizationData};

/// Pixels that fall outside the source frame.
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Renders frames onto the smoothed camera path.
///
/// Immutable once built, so one stabilizer can be shared across threads
/// and render distinct frames concurrently.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    data: StabilizationData,
    zoom: f32,
}

impl Stabilizer {
    /// Zoom that hides the borders exposed by typical corrections.
    pub const DEFAULT_ZOOM: f32 = 1.04;

    pub fn new(data: StabilizationData, zoom: f32) -> SteadyResult<Self> {
        if !(zoom >= 1.0 && zoom.is_finite()) {
            return Err(SteadyError::config(format!(
                "zoom must be a finite value >= 1.0, got {zoom}"
            )));
        }
        Ok(Self { data, zoom })
    }

    /// Load stabilization data from `path`.
    pub fn load(path: &Path, zoom: f32) -> SteadyResult<Self> {
        let data = StabilizationData::load(path)?;
        tracing::info!(
            path = %path.display(),
            frames = data.len(),
            zoom,
            "Stabilizer ready"
        );
        Self::new(data, zoom)
    }

    pub fn data(&self) -> &StabilizationData {
        &self.data
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Whether `frame_index` has a corrective transform.
    pub fn covers(&self, frame_index: u64) -> bool {
        self.data.transform(frame_index).is_ok()
    }

    /// Stabilized copy of `frame`, with the same dimensions.
    ///
    /// The frame is first warped by its corrective transform, then zoomed
    /// about its centre. Pixels with no source are transparent black.
    pub fn render(&self, frame_index: u64, frame: &RgbaImage) -> SteadyResult<RgbaImage> {
        let transform = self.data.transform(frame_index)?;
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(frame.clone());
        }

        let corrected = warp(
            frame,
            &corrective_projection(transform)?,
            Interpolation::Bilinear,
            TRANSPARENT,
        );
        let zoomed = warp(
            &corrected,
            &zoom_projection(self.zoom, width, height)?,
            Interpolation::Bilinear,
            TRANSPARENT,
        );

        tracing::trace!(
            frame = frame_index,
            dx = transform.dx,
            dy = transform.dy,
            da = transform.da,
            "Rendered stabilized frame"
        );
        Ok(zoomed)
    }

    /// Replace `frame` with its stabilized version.
    ///
    /// `frame` is left untouched when the index has no transform.
    pub fn apply(&self, frame_index: u64, frame: &mut RgbaImage) -> SteadyResult<()> {
        *frame = self.render(frame_index, frame)?;
        Ok(())
    }
}

/// Forward mapping `[cos -sin dx; sin cos dy]`.
pub fn corrective_projection(transform: &CorrectiveTransform) -> SteadyResult<Projection> {
    let [[a, b, c], [d, e, f]] = transform.affine_matrix();
    Projection::from_matrix([
        a as f32, b as f32, c as f32, d as f32, e as f32, f as f32, 0.0, 0.0, 1.0,
    ])
    .ok_or_else(|| SteadyError::render(format!("corrective transform {transform:?} is not invertible")))
}

/// Uniform scale by `zoom` about `(width / 2, height / 2)`, using integer
/// division so odd sizes zoom about a pixel centre.
pub fn zoom_projection(zoom: f32, width: u32, height: u32) -> SteadyResult<Projection> {
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;
    Projection::from_matrix([
        zoom,
        0.0,
        (1.0 - zoom) * cx,
        0.0,
        zoom,
        (1.0 - zoom) * cy,
        0.0,
        0.0,
        1.0,
    ])
    .ok_or_else(|| SteadyError::render(format!("zoom {zoom} is not invertible")))
}
