//! Priority-ordered mosaic compositing.
//!
//! Sources are applied strictly in the order given. Each one may only fill
//! output cells that are still no-data ("reverse painters"), so the first
//! source with data in a cell wins. A source whose destination window is
//! already full is skipped without being opened.

mod strategy;

pub use strategy::ReadStrategy;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chip_common::{PixelWindow, SourceDescriptor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::OverviewConfig;
use crate::context::JobContext;
use crate::error::{MosaicError, Result};
use crate::grid::OutputGrid;
use crate::overview::overview_levels;
use crate::planner::ExtractionPlan;
use crate::raster::{RasterSink, RasterSource, RasterStore};
use crate::types::RasterBlock;
use strategy::{output_tile_anchor, output_tile_size, TileStats};

/// A source paired with its extraction plan.
#[derive(Debug, Clone)]
pub struct PlannedSource {
    pub descriptor: SourceDescriptor,
    pub plan: ExtractionPlan,
}

impl PlannedSource {
    pub fn new(descriptor: SourceDescriptor, plan: ExtractionPlan) -> Self {
        Self { descriptor, plan }
    }
}

/// Why a source did not contribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "message")]
pub enum SkipReason {
    /// Every cell of its destination window was already filled.
    AlreadyCovered,
    /// It had no valid data inside its window.
    EmptySource,
    /// It had data, but only where higher-priority sources already did.
    NoNewPixels,
    /// Its footprint misses the output grid.
    NoOverlap,
    /// It could not be opened or read.
    Unreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyCovered => write!(f, "already covered"),
            Self::EmptySource => write!(f, "empty source"),
            Self::NoNewPixels => write!(f, "no new pixels"),
            Self::NoOverlap => write!(f, "no overlap"),
            Self::Unreadable(msg) => write!(f, "unreadable: {}", msg),
        }
    }
}

/// Result of applying one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Contributed { pixels: usize },
    Skipped(SkipReason),
}

/// A source that made no contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedSource {
    pub id: String,
    pub reason: SkipReason,
}

/// Outcome of one compositing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicResult {
    pub output_path: PathBuf,
    /// Ids of contributing sources, in priority order.
    pub used: Vec<String>,
    /// Sources that contributed nothing, in priority order.
    pub unused: Vec<UnusedSource>,
    /// Job-scoped warnings flushed at job end.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl MosaicResult {
    pub fn unused_ids(&self) -> Vec<&str> {
        self.unused.iter().map(|u| u.id.as_str()).collect()
    }
}

/// Composites planned sources into one output raster.
pub struct MosaicCompositor<'a> {
    ctx: &'a JobContext,
    strategy: ReadStrategy,
    short_circuit: bool,
    overviews: OverviewConfig,
}

impl<'a> MosaicCompositor<'a> {
    /// Compositor configured from the job's engine config.
    pub fn new(ctx: &'a JobContext) -> Self {
        let config = ctx.config();
        Self {
            ctx,
            strategy: config.read_strategy,
            short_circuit: config.short_circuit,
            overviews: config.overviews.clone(),
        }
    }

    pub fn with_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    pub fn with_overviews(mut self, overviews: OverviewConfig) -> Self {
        self.overviews = overviews;
        self
    }

    /// Apply every source in order, finalize and persist the output.
    ///
    /// Unreadable or empty sources are recorded as unused. Only failures
    /// of the output itself are returned as errors.
    #[instrument(skip_all, fields(job_id = %self.ctx.job_id(), sources = sources.len(), strategy = %self.strategy))]
    pub fn composite(
        &self,
        sources: &[PlannedSource],
        store: &dyn RasterStore,
        sink: &mut dyn RasterSink,
        output_path: &Path,
    ) -> Result<MosaicResult> {
        let mut used = Vec::new();
        let mut unused = Vec::new();

        for source in sources {
            match self.composite_source(source, store, sink)? {
                SourceOutcome::Contributed { pixels } => {
                    debug!(id = %source.descriptor.id, pixels = pixels, "Source contributed");
                    used.push(source.descriptor.id.clone());
                }
                SourceOutcome::Skipped(reason) => {
                    debug!(id = %source.descriptor.id, reason = %reason, "Source unused");
                    unused.push(UnusedSource {
                        id: source.descriptor.id.clone(),
                        reason,
                    });
                }
            }
        }

        if self.overviews.enabled {
            let profile = sink.profile();
            let levels = overview_levels(profile.max_dim(), profile.block_size.0);
            if !levels.is_empty() {
                sink.build_overviews(&levels, self.overviews.resampling)?;
            }
        }

        sink.persist(output_path)?;

        info!(
            output = %output_path.display(),
            used = used.len(),
            unused = unused.len(),
            "Mosaic complete"
        );

        Ok(MosaicResult {
            output_path: output_path.to_path_buf(),
            used,
            unused,
            warnings: Vec::new(),
        })
    }

    /// Apply one source to `sink`.
    ///
    /// Returns `Ok(Skipped(..))` for every recoverable outcome and `Err`
    /// only when the output can no longer be read or written.
    pub fn composite_source(
        &self,
        source: &PlannedSource,
        store: &dyn RasterStore,
        sink: &mut dyn RasterSink,
    ) -> Result<SourceOutcome> {
        let grid = OutputGrid::from(sink.profile());
        let window = match source.plan.window.intersection(&grid.extent()) {
            Some(w) => w,
            None => return Ok(SourceOutcome::Skipped(SkipReason::NoOverlap)),
        };

        if self.short_circuit && is_covered(sink, &window)? {
            return Ok(SourceOutcome::Skipped(SkipReason::AlreadyCovered));
        }

        let url = &source.descriptor.url;
        let raster = match store.open(url) {
            Ok(r) => r,
            Err(e) => return Ok(self.unreadable(&source.descriptor, e)),
        };

        let bands = raster.info().bands;
        if bands != 1 {
            let e = MosaicError::source_unreadable(
                url,
                format!("{} bands; only single-band rasters are supported", bands),
            );
            return Ok(self.unreadable(&source.descriptor, e));
        }

        match self.strategy {
            ReadStrategy::Whole => self.read_whole(source, raster.as_ref(), &grid, &window, sink),
            ReadStrategy::Windowed => {
                let stats = self.read_windowed(source, raster.as_ref(), &grid, &window, sink)?;
                Ok(self.tiled_outcome(&source.descriptor, stats))
            }
            ReadStrategy::ParallelWindowed => {
                let stats = self.read_parallel(source, &raster, &grid, &window, sink)?;
                Ok(self.tiled_outcome(&source.descriptor, stats))
            }
        }
    }

    fn unreadable(&self, descriptor: &SourceDescriptor, err: MosaicError) -> SourceOutcome {
        self.ctx
            .warn(format!("Source {} ({}) unreadable: {}", descriptor.id, descriptor.url, err));
        SourceOutcome::Skipped(SkipReason::Unreadable(err.to_string()))
    }

    fn read_whole(
        &self,
        source: &PlannedSource,
        raster: &dyn RasterSource,
        grid: &OutputGrid,
        window: &PixelWindow,
        sink: &mut dyn RasterSink,
    ) -> Result<SourceOutcome> {
        let request = source.plan.read_request_for(grid, window);
        let block = match raster.read(&request) {
            Ok(b) => b,
            Err(e) => return Ok(self.unreadable(&source.descriptor, e)),
        };

        if block.is_all_nodata() {
            return Ok(SourceOutcome::Skipped(SkipReason::EmptySource));
        }

        let written = merge_into(sink, window, block)?;
        if written > 0 {
            Ok(SourceOutcome::Contributed { pixels: written })
        } else {
            Ok(SourceOutcome::Skipped(SkipReason::NoNewPixels))
        }
    }

    fn read_windowed(
        &self,
        source: &PlannedSource,
        raster: &dyn RasterSource,
        grid: &OutputGrid,
        window: &PixelWindow,
        sink: &mut dyn RasterSink,
    ) -> Result<TileStats> {
        let (tw, th) = output_tile_size(raster.info(), grid.resolution);
        let anchor = output_tile_anchor(raster.info(), &source.plan, grid);
        let mut stats = TileStats::default();

        for tile in window.tiles_anchored(anchor, tw, th) {
            if self.short_circuit && is_covered(sink, &tile)? {
                stats.covered += 1;
                continue;
            }

            let request = source.plan.read_request_for(grid, &tile);
            let block = match raster.read(&request) {
                Ok(b) => b,
                Err(e) => {
                    self.tile_failed(&source.descriptor, &tile, &e);
                    stats.failed += 1;
                    continue;
                }
            };

            stats.read += 1;
            if block.is_all_nodata() {
                continue;
            }
            stats.with_data += 1;
            stats.written += merge_into(sink, &tile, block)?;
        }

        Ok(stats)
    }

    fn read_parallel(
        &self,
        source: &PlannedSource,
        raster: &Arc<dyn RasterSource>,
        grid: &OutputGrid,
        window: &PixelWindow,
        sink: &mut dyn RasterSink,
    ) -> Result<TileStats> {
        let (tw, th) = output_tile_size(raster.info(), grid.resolution);
        let anchor = output_tile_anchor(raster.info(), &source.plan, grid);
        let tiles = window.tiles_anchored(anchor, tw, th);
        let output = Mutex::new(sink);

        let results: Vec<Result<TileStats>> = tiles
            .par_iter()
            .map(|tile| {
                let mut stats = TileStats::default();

                if self.short_circuit {
                    let guard = lock_output(&output)?;
                    if is_covered(&**guard, tile)? {
                        stats.covered += 1;
                        return Ok(stats);
                    }
                }

                let request = source.plan.read_request_for(grid, tile);
                let block = match raster.read(&request) {
                    Ok(b) => b,
                    Err(e) => {
                        self.tile_failed(&source.descriptor, tile, &e);
                        stats.failed += 1;
                        return Ok(stats);
                    }
                };

                stats.read += 1;
                if block.is_all_nodata() {
                    return Ok(stats);
                }
                stats.with_data += 1;

                let mut guard = lock_output(&output)?;
                stats.written += merge_into(&mut **guard, tile, block)?;
                Ok(stats)
            })
            .collect();

        results
            .into_iter()
            .try_fold(TileStats::default(), |acc, r| r.map(|s| acc + s))
    }

    fn tile_failed(&self, descriptor: &SourceDescriptor, tile: &PixelWindow, err: &MosaicError) {
        warn!(
            id = %descriptor.id,
            col_off = tile.col_off,
            row_off = tile.row_off,
            error = %err,
            "Block read failed"
        );
        self.ctx.warn(format!(
            "Source {} block ({}, {}) unreadable: {}",
            descriptor.id, tile.col_off, tile.row_off, err
        ));
    }

    fn tiled_outcome(&self, descriptor: &SourceDescriptor, stats: TileStats) -> SourceOutcome {
        debug!(id = %descriptor.id, stats = ?stats, "Windowed read finished");

        if stats.written > 0 {
            SourceOutcome::Contributed {
                pixels: stats.written,
            }
        } else if stats.failed > 0 && stats.with_data == 0 {
            SourceOutcome::Skipped(SkipReason::Unreadable(format!(
                "{} block reads failed",
                stats.failed
            )))
        } else if stats.with_data > 0 {
            SourceOutcome::Skipped(SkipReason::NoNewPixels)
        } else if stats.read == 0 {
            SourceOutcome::Skipped(SkipReason::AlreadyCovered)
        } else {
            SourceOutcome::Skipped(SkipReason::EmptySource)
        }
    }
}

fn lock_output<'m, 's>(
    output: &'m Mutex<&'s mut dyn RasterSink>,
) -> Result<std::sync::MutexGuard<'m, &'s mut dyn RasterSink>> {
    output
        .lock()
        .map_err(|_| MosaicError::Io("output lock poisoned".to_string()))
}

/// Every cell of `window` in the output already holds data.
fn is_covered(sink: &dyn RasterSink, window: &PixelWindow) -> Result<bool> {
    Ok(!sink.read_window(window)?.has_nodata())
}

/// Copy the valid cells of `block` into the output cells of `window` that are
/// still no-data. Returns the number of cells written.
fn merge_into(sink: &mut dyn RasterSink, window: &PixelWindow, block: RasterBlock) -> Result<usize> {
    let nodata = sink.profile().nodata;
    let source = block.remap_nodata(nodata);
    let mut dest = sink.read_window(window)?;

    let mut written = 0;
    for i in 0..dest.data.len() {
        if dest.is_nodata_at(i) && !source.is_nodata_at(i) {
            dest.data[i] = source.data[i];
            written += 1;
        }
    }

    if written > 0 {
        sink.write_window(window, &dest)?;
    }
    Ok(written)
}
