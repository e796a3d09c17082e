//! Output raster profile.

use chip_common::{Crs, PixelTransform};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, DEFAULT_BIG_FORMAT_THRESHOLD_BYTES};
use crate::error::{MosaicError, Result};
use crate::grid::OutputGrid;
use crate::types::DataType;

/// Compression codec of the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
}

/// Full technical description of the output raster.
///
/// Only obtainable through [`OutputProfileBuilder`], which validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputProfile {
    pub crs: Crs,
    pub transform: PixelTransform,
    pub width: usize,
    pub height: usize,
    /// Block (tile) width and height.
    pub block_size: (usize, usize),
    pub compression: Compression,
    pub nodata: f64,
    pub dtype: DataType,
    pub tiled: bool,
    /// Estimated size needs 64-bit offsets (BigTIFF).
    pub big: bool,
}

impl OutputProfile {
    /// Estimated uncompressed size in bytes.
    pub fn estimated_bytes(&self) -> u64 {
        estimated_bytes(self.dtype, self.width, self.height)
    }

    pub fn max_dim(&self) -> usize {
        self.width.max(self.height)
    }
}

impl From<&OutputProfile> for OutputGrid {
    fn from(profile: &OutputProfile) -> Self {
        Self {
            transform: profile.transform,
            crs: profile.crs,
            resolution: profile.transform.resolution(),
            width: profile.width,
            height: profile.height,
        }
    }
}

/// Base values merged under every profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub block_size: usize,
    pub nodata: f64,
    pub dtype: DataType,
    pub compression: Compression,
    pub big_format_threshold_bytes: u64,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            block_size: 512,
            nodata: -9999.0,
            dtype: DataType::Float32,
            compression: Compression::Deflate,
            big_format_threshold_bytes: DEFAULT_BIG_FORMAT_THRESHOLD_BYTES,
        }
    }
}

impl From<&EngineConfig> for ProfileDefaults {
    fn from(config: &EngineConfig) -> Self {
        Self {
            block_size: config.block_size,
            nodata: config.nodata,
            dtype: config.dtype,
            compression: Compression::Deflate,
            big_format_threshold_bytes: config.big_format_threshold_bytes,
        }
    }
}

fn estimated_bytes(dtype: DataType, width: usize, height: usize) -> u64 {
    (width as u64) * (height as u64) * dtype.bits_per_pixel() / 8
}

/// Builds validated [`OutputProfile`]s.
#[derive(Debug, Clone, Default)]
pub struct OutputProfileBuilder {
    defaults: ProfileDefaults,
}

impl OutputProfileBuilder {
    pub fn new(defaults: ProfileDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ProfileDefaults {
        &self.defaults
    }

    /// Whether a `width` x `height` raster of `dtype` needs the big format.
    pub fn needs_64bit(&self, dtype: DataType, width: usize, height: usize) -> bool {
        estimated_bytes(dtype, width, height) >= self.defaults.big_format_threshold_bytes
    }

    /// Merge overrides onto the defaults and validate.
    ///
    /// `None` overrides take the default. Tiling and compression are always
    /// forced.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        crs: Crs,
        height: usize,
        width: usize,
        transform: PixelTransform,
        block_size: Option<usize>,
        nodata: Option<f64>,
        dtype: Option<DataType>,
    ) -> Result<OutputProfile> {
        if crs.is_geographic() {
            return Err(MosaicError::UnsupportedOutputCrs(crs.to_string()));
        }

        if width == 0 || height == 0 {
            return Err(MosaicError::invalid_profile(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        let block = block_size.unwrap_or(self.defaults.block_size);
        if block == 0 || block % 16 != 0 {
            return Err(MosaicError::invalid_profile(format!(
                "block size {} must be a positive multiple of 16",
                block
            )));
        }

        if !(transform.pixel_width > 0.0) || !(transform.pixel_height < 0.0) {
            return Err(MosaicError::invalid_profile(
                "transform must be north-up with positive cell size",
            ));
        }

        let nodata = nodata.unwrap_or(self.defaults.nodata);
        let dtype = dtype.unwrap_or(self.defaults.dtype);

        Ok(OutputProfile {
            crs,
            transform,
            width,
            height,
            block_size: (block, block),
            compression: self.defaults.compression,
            nodata,
            dtype,
            tiled: true,
            big: self.needs_64bit(dtype, width, height),
        })
    }

    /// Profile covering `grid` with default block size.
    pub fn from_grid(&self, grid: &OutputGrid, dtype: DataType, nodata: f64) -> Result<OutputProfile> {
        self.build(
            grid.crs,
            grid.height,
            grid.width,
            grid.transform,
            None,
            Some(nodata),
            Some(dtype),
        )
    }
}
