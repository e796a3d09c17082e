//! Read strategies for pulling one source into the output.

use chip_common::window::snap_residue;
use serde::{Deserialize, Serialize};

use crate::grid::OutputGrid;
use crate::planner::ExtractionPlan;
use crate::raster::RasterInfo;

/// How a source's planned window is read.
///
/// All strategies produce the same composite; they differ in peak memory,
/// I/O pattern and how precisely unused sources are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// One read covering the whole planned window.
    Whole,
    /// Iterate the source's block tiling mapped onto the output grid,
    /// skipping blocks that are already covered.
    #[default]
    Windowed,
    /// Like `Windowed`, with blocks read concurrently on the rayon pool.
    ParallelWindowed,
}

impl ReadStrategy {
    /// Parse from string (case-insensitive). Unknown values fall back to
    /// the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "whole" | "whole_raster" => Self::Whole,
            "parallel" | "parallel_windowed" => Self::ParallelWindowed,
            _ => Self::Windowed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whole => "whole",
            Self::Windowed => "windowed",
            Self::ParallelWindowed => "parallel_windowed",
        }
    }

    pub fn is_windowed(&self) -> bool {
        !matches!(self, Self::Whole)
    }
}

impl std::fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Size in output cells of one source block.
pub(crate) fn output_tile_size(info: &RasterInfo, out_resolution: f64) -> (usize, usize) {
    let ratio = if out_resolution > 0.0 && info.resolution > 0.0 {
        info.resolution / out_resolution
    } else {
        1.0
    };
    let scale = |n: usize| ((n as f64 * ratio).ceil() as usize).max(1);
    (scale(info.block_size.0), scale(info.block_size.1))
}

/// Output cell where the source's block grid starts.
///
/// Same-CRS sources use their native origin; reprojected sources use the
/// origin of their reprojected footprint.
pub(crate) fn output_tile_anchor(
    info: &RasterInfo,
    plan: &ExtractionPlan,
    grid: &OutputGrid,
) -> (i64, i64) {
    let origin = if info.crs == grid.crs {
        &info.transform
    } else {
        plan.intermediate.as_ref().unwrap_or(&plan.transform)
    };
    let (col, row) = grid.transform.ground_to_pixel(origin.origin_x, origin.origin_y);
    (snap_residue(col).floor() as i64, snap_residue(row).floor() as i64)
}

/// Per-tile bookkeeping, summed over a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TileStats {
    /// Tiles skipped because the output was already filled.
    pub covered: usize,
    /// Tiles actually read.
    pub read: usize,
    /// Read tiles with at least one valid cell.
    pub with_data: usize,
    /// Cells written into the output.
    pub written: usize,
    /// Tiles whose read failed.
    pub failed: usize,
}

impl std::ops::Add for TileStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            covered: self.covered + other.covered,
            read: self.read + other.read,
            with_data: self.with_data + other.with_data,
            written: self.written + other.written,
            failed: self.failed + other.failed,
        }
    }
}
