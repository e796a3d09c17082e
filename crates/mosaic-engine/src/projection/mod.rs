//! Coordinate transformation seam and sampling kernels.
//!
//! The engine never does projection math itself. Anything that needs to move
//! coordinates between CRSs goes through a [`CrsTransformer`] supplied by the
//! caller (a PROJ binding, a lookup table, a test double).

pub mod interpolation;

pub use interpolation::{bilinear_sample, cubic_sample, nearest_sample, sample};

use chip_common::{BoundingBox, Crs};

use crate::error::{MosaicError, Result};

/// Points sampled along each bbox edge when reprojecting bounds.
pub const DENSIFY_SAMPLES: usize = 21;

/// Transforms coordinates between CRSs.
pub trait CrsTransformer: Send + Sync {
    /// Transform one point from `from` to `to`.
    fn transform_point(&self, x: f64, y: f64, from: &Crs, to: &Crs) -> Result<(f64, f64)>;

    /// Transform a bounding box into `to`, densifying each edge so curved
    /// edges in the target CRS are enclosed.
    fn transform_bounds(&self, bbox: &BoundingBox, to: &Crs) -> Result<BoundingBox> {
        if bbox.crs == *to {
            return Ok(*bbox);
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        let mut converted = 0usize;

        let n = DENSIFY_SAMPLES.max(1);
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let x = bbox.west + t * bbox.width();
            let y = bbox.south + t * bbox.height();

            for (px, py) in [(x, bbox.south), (x, bbox.north), (bbox.west, y), (bbox.east, y)] {
                if let Ok((tx, ty)) = self.transform_point(px, py, &bbox.crs, to) {
                    min_x = min_x.min(tx);
                    min_y = min_y.min(ty);
                    max_x = max_x.max(tx);
                    max_y = max_y.max(ty);
                    converted += 1;
                }
            }
        }

        if converted == 0 || !(min_x < max_x) || !(min_y < max_y) {
            return Err(MosaicError::projection(format!(
                "could not transform bounds from {} to {}",
                bbox.crs, to
            )));
        }

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y, *to))
    }
}

/// Transformer that only accepts identical source and target CRSs.
///
/// The default when no projection library is wired in: same-CRS jobs work,
/// cross-CRS jobs report a projection error for the offending source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameCrsTransformer;

impl CrsTransformer for SameCrsTransformer {
    fn transform_point(&self, x: f64, y: f64, from: &Crs, to: &Crs) -> Result<(f64, f64)> {
        if from == to {
            Ok((x, y))
        } else {
            Err(MosaicError::projection(format!(
                "no transformer configured for {} -> {}",
                from, to
            )))
        }
    }
}
