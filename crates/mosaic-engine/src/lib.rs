//! Grid alignment, extraction planning and mosaic compositing.
//!
//! This crate computes *where* source pixels must land on a shared output
//! grid and *in what order* sources are read and layered. Reading, warping
//! and coordinate transformation are delegated to the [`raster`] and
//! [`projection`] seams.
//!
//! # Pipeline
//!
//! ```text
//! ordered SourceDescriptors
//!      │
//!      ▼
//! shared_output_grid()        LCM-aligned grid over every resolution
//!      │
//!      ▼
//! ExtractionPlanner           per-source window + read parameters
//!      │
//!      ▼
//! OutputProfileBuilder        dimensions, block size, big-format flag
//!      │
//!      ▼
//! MosaicCompositor            reverse-painters layering, short-circuit,
//!      │                      overviews
//!      ▼
//! GeoTIFF + MosaicResult      used / unused sources
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mosaic_engine::{JobContext, MosaicJob, MosaicRequest, SameCrsTransformer};
//!
//! let ctx = JobContext::new(EngineConfig::from_env());
//! let job = MosaicJob::new(&ctx, &store, Arc::new(SameCrsTransformer));
//! let result = job.run(&sources, &request)?;
//! println!("used: {:?}, unused: {:?}", result.used, result.unused_ids());
//! ```

pub mod compositor;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod job;
pub mod overview;
pub mod planner;
pub mod profile;
pub mod projection;
pub mod raster;
pub mod types;

// Re-export commonly used types at crate root
pub use compositor::{
    MosaicCompositor, MosaicResult, PlannedSource, ReadStrategy, SkipReason, SourceOutcome,
    UnusedSource,
};
pub use config::{EngineConfig, OverviewConfig};
pub use context::JobContext;
pub use error::{MosaicError, Result};
pub use grid::{lcm_aligned_bounds, shared_output_grid, snap_to_pixel_grid, OutputGrid};
pub use job::{MosaicJob, MosaicRequest};
pub use overview::{overview_levels, OverviewResampling};
pub use planner::{ExtractionPlan, ExtractionPlanner, NativeGrid};
pub use profile::{Compression, OutputProfile, OutputProfileBuilder, ProfileDefaults};
pub use projection::{CrsTransformer, SameCrsTransformer};
pub use raster::{
    MemoryRaster, MemoryStore, RasterInfo, RasterSink, RasterSource, RasterStore, ReadRequest,
    ScratchRaster,
};
pub use types::{DataType, RasterBlock, Resampling};
