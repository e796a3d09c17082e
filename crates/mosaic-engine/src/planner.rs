//! Per-source extraction planning.
//!
//! Given a source's native grid and the job's [`OutputGrid`], the planner
//! works out which output cells the source can contribute to and how the
//! raster primitive has to be asked for them (pass-through, rescale or
//! reprojection).

use std::sync::Arc;

use chip_common::{BoundingBox, Crs, PixelTransform, PixelWindow, Window};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::grid::{snap_to_pixel_grid, OutputGrid};
use crate::projection::CrsTransformer;
use crate::raster::{RasterInfo, ReadRequest};
use crate::types::Resampling;

/// Relative tolerance when comparing native and output resolutions.
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Native geometry of one source raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeGrid {
    pub transform: PixelTransform,
    pub crs: Crs,
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl NativeGrid {
    /// Ground footprint of the source in its own CRS.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.raster_bounds(self.width, self.height, self.crs)
    }
}

impl From<&RasterInfo> for NativeGrid {
    fn from(info: &RasterInfo) -> Self {
        Self {
            transform: info.transform,
            crs: info.crs,
            resolution: info.resolution,
            width: info.width,
            height: info.height,
        }
    }
}

/// Derived read parameters for one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    /// Destination transform, aligned to the shared output grid.
    pub transform: PixelTransform,
    pub width: usize,
    pub height: usize,
    /// Destination CRS (the output CRS).
    pub crs: Crs,
    /// Destination resolution (the output resolution).
    pub resolution: f64,
    pub resampling: Resampling,
    /// Non-aligned view the primitive resamples through, set only when the
    /// source has to be resampled or reprojected.
    pub intermediate: Option<PixelTransform>,
    /// Destination window on the output grid.
    pub window: PixelWindow,
}

impl ExtractionPlan {
    /// The source does not touch the output grid.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn requires_resampling(&self) -> bool {
        self.intermediate.is_some()
    }

    /// Read request covering the whole planned window.
    pub fn read_request(&self) -> ReadRequest {
        ReadRequest {
            transform: self.transform,
            crs: self.crs,
            width: self.width,
            height: self.height,
            resampling: self.resampling,
            intermediate: self.intermediate,
        }
    }

    /// Read request for `sub`, a window on the output grid inside the plan.
    pub fn read_request_for(&self, output: &OutputGrid, sub: &PixelWindow) -> ReadRequest {
        ReadRequest {
            transform: output.transform.window_transform(sub),
            crs: self.crs,
            width: sub.width,
            height: sub.height,
            resampling: self.resampling,
            intermediate: self.intermediate,
        }
    }
}

/// Derives [`ExtractionPlan`]s against one output grid.
#[derive(Clone)]
pub struct ExtractionPlanner {
    transformer: Arc<dyn CrsTransformer>,
}

impl ExtractionPlanner {
    pub fn new(transformer: Arc<dyn CrsTransformer>) -> Self {
        Self { transformer }
    }

    /// Plan how `native` contributes to `output`.
    ///
    /// Fails with [`MosaicError::UnsupportedOutputCrs`] for geographic output
    /// CRSs and with a projection error when the footprint cannot be moved
    /// into the output CRS. A source outside the grid gets an empty window.
    pub fn derive_params(
        &self,
        native: &NativeGrid,
        output: &OutputGrid,
        resampling: Resampling,
    ) -> Result<ExtractionPlan> {
        if output.crs.is_geographic() {
            return Err(MosaicError::UnsupportedOutputCrs(output.crs.to_string()));
        }

        let same_crs = native.crs == output.crs;
        let same_resolution = (native.resolution - output.resolution).abs()
            <= RESOLUTION_EPSILON * output.resolution.abs().max(1.0);

        let (footprint, intermediate, resampling) = if same_crs && same_resolution {
            (native.bounds(), None, Resampling::Nearest)
        } else if same_crs {
            let factor = output.resolution / native.resolution;
            let intermediate = native.transform.scaled(factor);
            let extent = Window::new(
                0.0,
                0.0,
                native.width as f64 / factor,
                native.height as f64 / factor,
            );
            (
                intermediate.window_bounds(&extent, native.crs),
                Some(intermediate),
                resampling,
            )
        } else {
            let projected = self
                .transformer
                .transform_bounds(&native.bounds(), &output.crs)?;
            let intermediate = PixelTransform::from_origin(
                projected.west,
                projected.north,
                output.resolution,
                output.resolution,
            );
            (projected, Some(intermediate), resampling)
        };

        let window = snap_to_pixel_grid(&footprint, &output.transform)
            .intersection(&output.extent())
            .unwrap_or_else(|| PixelWindow::new(0, 0, 0, 0));

        debug!(
            src_crs = %native.crs,
            src_resolution = native.resolution,
            col_off = window.col_off,
            row_off = window.row_off,
            width = window.width,
            height = window.height,
            resampled = intermediate.is_some(),
            "Derived extraction plan"
        );

        Ok(ExtractionPlan {
            transform: output.transform.window_transform(&window),
            width: window.width,
            height: window.height,
            crs: output.crs,
            resolution: output.resolution,
            resampling,
            intermediate,
            window,
        })
    }
}

impl std::fmt::Debug for ExtractionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPlanner").finish_non_exhaustive()
    }
}
