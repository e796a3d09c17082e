//! Raster store seams.
//!
//! The engine never reads, warps or encodes pixels on its own terms; it asks
//! a [`RasterSource`] for a window on a given grid and writes the result into
//! a [`RasterSink`]. [`MemoryRaster`] is an in-memory source,
//! [`ScratchRaster`] the in-memory output, and [`geotiff`] persists it.

pub mod geotiff;
mod memory;

pub use memory::{MemoryRaster, MemoryStore, ScratchRaster};

use std::path::Path;
use std::sync::Arc;

use chip_common::{Crs, PixelTransform, PixelWindow};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::overview::OverviewResampling;
use crate::profile::OutputProfile;
use crate::types::{DataType, RasterBlock, Resampling};

/// Native description of an opened raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub transform: PixelTransform,
    pub crs: Crs,
    pub resolution: f64,
    pub dtype: DataType,
    pub nodata: Option<f64>,
    pub width: usize,
    pub height: usize,
    /// Natural block (tile) size as (width, height).
    pub block_size: (usize, usize),
    pub bands: usize,
}

/// A request to read a source onto a target grid.
///
/// The target grid is described by `transform`, `crs`, `width` and `height`.
/// When `intermediate` is set the store is expected to resample through that
/// view before sampling onto the target grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub transform: PixelTransform,
    pub crs: Crs,
    pub width: usize,
    pub height: usize,
    pub resampling: Resampling,
    pub intermediate: Option<PixelTransform>,
}

/// An opened, readable source raster.
///
/// Implementations must tolerate concurrent reads from several threads.
pub trait RasterSource: Send + Sync {
    /// Native description of the raster.
    fn info(&self) -> &RasterInfo;

    /// Read band 1 onto the requested grid.
    ///
    /// Cells the source does not cover come back as the source's no-data.
    fn read(&self, request: &ReadRequest) -> Result<RasterBlock>;
}

/// Opens sources by URL or path.
pub trait RasterStore: Send + Sync {
    fn open(&self, url: &str) -> Result<Arc<dyn RasterSource>>;
}

/// A writable output raster.
pub trait RasterSink: Send {
    fn profile(&self) -> &OutputProfile;

    /// Read back a window of what has been written so far.
    fn read_window(&self, window: &PixelWindow) -> Result<RasterBlock>;

    /// Overwrite a window with `block`.
    fn write_window(&mut self, window: &PixelWindow, block: &RasterBlock) -> Result<()>;

    /// Build reduced-resolution copies at the given decimation factors.
    fn build_overviews(&mut self, levels: &[usize], method: OverviewResampling) -> Result<()>;

    /// Write the finished raster to `path`.
    fn persist(&self, path: &Path) -> Result<()>;
}
