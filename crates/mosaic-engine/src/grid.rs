//! Pixel-grid alignment.
//!
//! Three operations keep every output pixel of a multi-source mosaic on the
//! same grid cell regardless of the sources' native resolutions:
//!
//! - [`snap_to_pixel_grid`] turns a ground bbox into a target-aligned pixel
//!   window that always contains the bbox.
//! - [`lcm_aligned_bounds`] moves an extent pair outward onto multiples of the
//!   least common multiple of several resolutions.
//! - [`shared_output_grid`] combines both to build the job's output grid.

use chip_common::window::RESIDUE_TOLERANCE;
use chip_common::{BoundingBox, Crs, PixelTransform, PixelWindow, Window};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::projection::CrsTransformer;

/// Resolutions are compared in hundredths of a ground unit.
const RESOLUTION_SCALE: f64 = 100.0;

/// The grid every source is composited onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputGrid {
    pub transform: PixelTransform,
    pub crs: Crs,
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl OutputGrid {
    /// Ground footprint of the whole grid.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.raster_bounds(self.width, self.height, self.crs)
    }

    /// Window covering the full grid.
    pub fn extent(&self) -> PixelWindow {
        PixelWindow::full(self.width, self.height)
    }
}

/// Convert `bbox` into a pixel window on `transform`'s grid.
///
/// Offsets are floored and lengths ceiled. When an offset had to move to
/// reach a pixel boundary, the matching length gains one cell so the far
/// edge is still covered. Values within [`RESIDUE_TOLERANCE`] of an integer
/// count as integral, which makes the snap idempotent.
pub fn snap_to_pixel_grid(bbox: &BoundingBox, transform: &PixelTransform) -> PixelWindow {
    let window = Window::from_bounds(bbox, transform);
    let extra_col = if window.has_col_residue() { 1.0 } else { 0.0 };
    let extra_row = if window.has_row_residue() { 1.0 } else { 0.0 };

    let snapped = window.round_offsets_floor().round_lengths_ceil();
    Window::new(
        snapped.col_off,
        snapped.row_off,
        snapped.width + extra_col,
        snapped.height + extra_row,
    )
    .to_pixel_window()
}

/// Snap an extent pair outward so both ends are multiples of the LCM of
/// `resolutions`.
///
/// `anti` is the more negative value (west or south) and moves down; `pro`
/// is the more positive value (east or north) and moves up. Values already
/// on a multiple stay put. Without a usable multiple (see [`lcm_unit`]) the
/// pair comes back unchanged.
pub fn lcm_aligned_bounds(anti: f64, pro: f64, resolutions: &[f64]) -> (f64, f64) {
    match lcm_unit(resolutions) {
        Some(unit) => align_outward(anti, pro, unit),
        None => (anti, pro),
    }
}

/// Least common multiple of `resolutions`, in ground units.
///
/// `None` when no resolution is positive or the multiple does not fit in a
/// `u64` count of hundredths.
pub fn lcm_unit(resolutions: &[f64]) -> Option<f64> {
    let mut acc = 0u64;
    for r in resolutions
        .iter()
        .map(|r| (r.abs() * RESOLUTION_SCALE).round() as u64)
        .filter(|r| *r > 0)
    {
        acc = if acc == 0 { r } else { lcm(acc, r)? };
    }
    (acc > 0).then(|| acc as f64 / RESOLUTION_SCALE)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    (a / gcd(a, b)).checked_mul(b)
}

fn align_outward(anti: f64, pro: f64, unit: f64) -> (f64, f64) {
    if !(unit > 0.0) {
        return (anti, pro);
    }
    (snap_down(anti, unit), snap_up(pro, unit))
}

fn snap_down(value: f64, unit: f64) -> f64 {
    let q = value / unit;
    let r = q.round();
    if (q - r).abs() < RESIDUE_TOLERANCE {
        r * unit
    } else {
        q.floor() * unit
    }
}

fn snap_up(value: f64, unit: f64) -> f64 {
    let q = value / unit;
    let r = q.round();
    if (q - r).abs() < RESIDUE_TOLERANCE {
        r * unit
    } else {
        q.ceil() * unit
    }
}

/// Build the output grid shared by every source of a job.
///
/// `bbox` is reprojected into `out_crs` when needed. The north-west and
/// south-east corners are aligned to the LCM of `resolutions` and
/// `out_resolution`, and the grid dimensions come from re-snapping the
/// aligned bbox. When that LCM overflows, the corners are aligned to
/// `out_resolution` alone.
pub fn shared_output_grid(
    resolutions: &[f64],
    bbox: &BoundingBox,
    out_crs: &Crs,
    out_resolution: f64,
    transformer: &dyn CrsTransformer,
) -> Result<OutputGrid> {
    let bbox = if bbox.crs == *out_crs {
        *bbox
    } else {
        transformer.transform_bounds(bbox, out_crs)?
    };

    let mut resolution_set: Vec<f64> = resolutions.to_vec();
    resolution_set.push(out_resolution);

    let unit = match lcm_unit(&resolution_set) {
        Some(unit) => unit,
        None => {
            warn!(
                resolutions = ?resolution_set,
                out_resolution = out_resolution,
                "Resolution LCM overflows; aligning to the output resolution"
            );
            out_resolution
        }
    };

    let (west, north) = align_outward(bbox.west, bbox.north, unit);
    let (south, east) = align_outward(bbox.south, bbox.east, unit);

    let aligned = BoundingBox::new(west, south, east, north, *out_crs);
    let transform = PixelTransform::from_origin(west, north, out_resolution, out_resolution);
    let window = snap_to_pixel_grid(&aligned, &transform);

    debug!(
        west = west,
        south = south,
        east = east,
        north = north,
        width = window.width,
        height = window.height,
        unit = unit,
        "Built shared output grid"
    );

    Ok(OutputGrid {
        transform,
        crs: *out_crs,
        resolution: out_resolution,
        width: window.width,
        height: window.height,
    })
}
