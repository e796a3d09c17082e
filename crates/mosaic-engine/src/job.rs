//! End-to-end mosaic job: plan every source, build the shared grid and
//! output profile, composite, persist.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chip_common::{BoundingBox, Crs, SourceDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::compositor::{MosaicCompositor, MosaicResult, PlannedSource, SkipReason, UnusedSource};
use crate::context::JobContext;
use crate::error::{MosaicError, Result};
use crate::grid::{lcm_unit, shared_output_grid};
use crate::planner::{ExtractionPlanner, NativeGrid};
use crate::profile::{OutputProfileBuilder, ProfileDefaults};
use crate::projection::CrsTransformer;
use crate::raster::{RasterInfo, RasterStore, ScratchRaster};

/// What to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicRequest {
    /// Area of interest, in any CRS the transformer understands.
    pub bbox: BoundingBox,
    pub out_crs: Crs,
    pub out_resolution: f64,
    pub output_path: PathBuf,
}

/// Runs one mosaic job against a raster store.
pub struct MosaicJob<'a> {
    ctx: &'a JobContext,
    store: &'a dyn RasterStore,
    transformer: Arc<dyn CrsTransformer>,
}

impl<'a> MosaicJob<'a> {
    pub fn new(
        ctx: &'a JobContext,
        store: &'a dyn RasterStore,
        transformer: Arc<dyn CrsTransformer>,
    ) -> Self {
        Self {
            ctx,
            store,
            transformer,
        }
    }

    /// Composite `sources` (highest priority first) into `request.output_path`.
    ///
    /// Fails only for a geographic output CRS, an invalid output grid, or an
    /// output that cannot be written. Everything else ends up in
    /// [`MosaicResult::unused`].
    #[instrument(skip_all, fields(job_id = %self.ctx.job_id(), sources = sources.len()))]
    pub fn run(&self, sources: &[SourceDescriptor], request: &MosaicRequest) -> Result<MosaicResult> {
        if request.out_crs.is_geographic() {
            return Err(MosaicError::UnsupportedOutputCrs(request.out_crs.to_string()));
        }

        let config = self.ctx.config();
        let mut unused = Vec::new();

        // Native metadata for every readable source.
        let mut opened: Vec<(&SourceDescriptor, RasterInfo)> = Vec::with_capacity(sources.len());
        for descriptor in sources {
            match self.store.open(&descriptor.url) {
                Ok(raster) => opened.push((descriptor, raster.info().clone())),
                Err(e) => {
                    self.ctx.warn(format!(
                        "Source {} ({}) unreadable: {}",
                        descriptor.id, descriptor.url, e
                    ));
                    unused.push(UnusedSource {
                        id: descriptor.id.clone(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                }
            }
        }

        let resolutions: Vec<f64> = opened.iter().map(|(_, info)| info.resolution).collect();
        let grid = shared_output_grid(
            &resolutions,
            &request.bbox,
            &request.out_crs,
            request.out_resolution,
            self.transformer.as_ref(),
        )?;
        let mut aligned_on = resolutions.clone();
        aligned_on.push(request.out_resolution);
        if lcm_unit(&aligned_on).is_none() {
            self.ctx.warn(format!(
                "Resolutions {:?} have no representable common multiple; grid aligned to {}",
                aligned_on, request.out_resolution
            ));
        }

        let planner = ExtractionPlanner::new(Arc::clone(&self.transformer));
        let mut planned = Vec::with_capacity(opened.len());
        for (descriptor, info) in opened {
            match planner.derive_params(&NativeGrid::from(&info), &grid, config.resampling) {
                Ok(plan) => planned.push(PlannedSource::new(descriptor.clone(), plan)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.ctx
                        .warn(format!("Source {} could not be planned: {}", descriptor.id, e));
                    unused.push(UnusedSource {
                        id: descriptor.id.clone(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                }
            }
        }

        let builder = OutputProfileBuilder::new(ProfileDefaults::from(config));
        let profile = builder.from_grid(&grid, config.dtype, config.nodata)?;
        debug!(
            width = profile.width,
            height = profile.height,
            big = profile.big,
            "Output profile ready"
        );

        let mut sink = ScratchRaster::create(&profile);
        let mut result = MosaicCompositor::new(self.ctx).composite(
            &planned,
            self.store,
            &mut sink,
            &request.output_path,
        )?;

        // Keep unused sources in priority order.
        let rank: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        result.unused.extend(unused);
        result
            .unused
            .sort_by_key(|u| rank.get(u.id.as_str()).copied().unwrap_or(usize::MAX));

        result.warnings = self.ctx.flush();
        info!(
            used = result.used.len(),
            unused = result.unused.len(),
            warnings = result.warnings.len(),
            "Mosaic job finished"
        );
        Ok(result)
    }
}
