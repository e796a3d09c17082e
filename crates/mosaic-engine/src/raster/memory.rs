//! In-memory rasters and store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chip_common::{Crs, PixelTransform, PixelWindow, Window};
use tracing::{debug, trace, warn};

use super::{geotiff, RasterInfo, RasterSink, RasterSource, RasterStore, ReadRequest};
use crate::error::{MosaicError, Result};
use crate::overview::{build_pyramid, OverviewResampling};
use crate::profile::OutputProfile;
use crate::projection::{sample, CrsTransformer};
use crate::types::{RasterBlock, Resampling};

/// Cells of padding around a staged intermediate block (cubic reach).
const KERNEL_MARGIN: i64 = 2;

/// A single-band source raster held in memory.
///
/// Reads sample the target grid at cell centers with the requested
/// resampling. When the request carries an intermediate view the native
/// pixels are first resampled onto that grid and the target is sampled from
/// there.
pub struct MemoryRaster {
    url: String,
    info: RasterInfo,
    pixels: RasterBlock,
    transformer: Option<Arc<dyn CrsTransformer>>,
    reads: AtomicUsize,
}

impl MemoryRaster {
    /// Wrap `data` (row-major, `info.width` x `info.height`) as a source.
    pub fn new(url: impl Into<String>, info: RasterInfo, data: Vec<f64>) -> Result<Self> {
        let url = url.into();
        if data.len() != info.width * info.height {
            return Err(MosaicError::source_unreadable(
                url,
                format!(
                    "expected {} cells for {}x{}, got {}",
                    info.width * info.height,
                    info.width,
                    info.height,
                    data.len()
                ),
            ));
        }

        let pixels = RasterBlock::new(info.width, info.height, data, info.nodata);
        Ok(Self {
            url,
            info,
            pixels,
            transformer: None,
            reads: AtomicUsize::new(0),
        })
    }

    /// Allow reads in other CRSs through `transformer`.
    pub fn with_transformer(mut self, transformer: Arc<dyn CrsTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of `read` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MemoryRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRaster")
            .field("url", &self.url)
            .field("info", &self.info)
            .field("reads", &self.read_count())
            .finish_non_exhaustive()
    }
}

impl RasterSource for MemoryRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read(&self, request: &ReadRequest) -> Result<RasterBlock> {
        if self.info.bands != 1 {
            return Err(MosaicError::source_unreadable(
                &self.url,
                format!("{} bands; only single-band rasters are supported", self.info.bands),
            ));
        }

        let transformer = if request.crs == self.info.crs {
            None
        } else {
            match &self.transformer {
                Some(t) => Some(t.as_ref()),
                None => {
                    return Err(MosaicError::source_unreadable(
                        &self.url,
                        format!("cannot warp {} to {}", self.info.crs, request.crs),
                    ))
                }
            }
        };

        self.reads.fetch_add(1, Ordering::Relaxed);
        trace!(
            url = %self.url,
            width = request.width,
            height = request.height,
            resampling = request.resampling.as_str(),
            "Reading memory raster"
        );

        let data = match request.intermediate {
            None => self.sample_onto(
                &request.transform,
                request.width,
                request.height,
                &request.crs,
                transformer,
                request.resampling,
            )?,
            Some(view) => {
                let (grid, block) = self.stage_intermediate(request, &view, transformer)?;
                let fill = self.info.nodata.unwrap_or(f64::NAN);
                let mut data = vec![fill; request.width * request.height];
                for row in 0..request.height {
                    for col in 0..request.width {
                        let (x, y) = request.transform.pixel_center(col, row);
                        let (c, r) = grid.ground_to_pixel(x, y);
                        if let Some(v) = sample(&block, c - 0.5, r - 0.5, request.resampling) {
                            data[row * request.width + col] = v;
                        }
                    }
                }
                data
            }
        };

        Ok(RasterBlock::new(request.width, request.height, data, self.info.nodata))
    }
}

impl MemoryRaster {
    /// Sample the native pixels at every cell center of a `width` x `height`
    /// grid on `transform` in `crs`.
    fn sample_onto(
        &self,
        transform: &PixelTransform,
        width: usize,
        height: usize,
        crs: &Crs,
        transformer: Option<&dyn CrsTransformer>,
        resampling: Resampling,
    ) -> Result<Vec<f64>> {
        let fill = self.info.nodata.unwrap_or(f64::NAN);
        let mut data = vec![fill; width * height];

        for row in 0..height {
            for col in 0..width {
                let (x, y) = transform.pixel_center(col, row);
                let (x, y) = match transformer {
                    Some(t) => t
                        .transform_point(x, y, crs, &self.info.crs)
                        .map_err(|e| MosaicError::source_unreadable(&self.url, e.to_string()))?,
                    None => (x, y),
                };

                let (src_col, src_row) = self.info.transform.ground_to_pixel(x, y);
                if let Some(v) = sample(&self.pixels, src_col - 0.5, src_row - 0.5, resampling) {
                    data[row * width + col] = v;
                }
            }
        }

        Ok(data)
    }

    /// Resample the native pixels onto the part of the `view` grid under the
    /// request footprint, padded for the widest kernel.
    ///
    /// Cell indices of the staged block are global to `view`, so every tile
    /// of one source sees the same intermediate values.
    fn stage_intermediate(
        &self,
        request: &ReadRequest,
        view: &PixelTransform,
        transformer: Option<&dyn CrsTransformer>,
    ) -> Result<(PixelTransform, RasterBlock)> {
        let footprint = request
            .transform
            .raster_bounds(request.width, request.height, request.crs);
        let covered = Window::from_bounds(&footprint, view).to_pixel_window();
        let staged = PixelWindow::new(
            covered.col_off - KERNEL_MARGIN,
            covered.row_off - KERNEL_MARGIN,
            covered.width + 2 * KERNEL_MARGIN as usize,
            covered.height + 2 * KERNEL_MARGIN as usize,
        );
        let grid = view.window_transform(&staged);

        let data = self.sample_onto(
            &grid,
            staged.width,
            staged.height,
            &request.crs,
            transformer,
            request.resampling,
        )?;
        Ok((grid, RasterBlock::new(staged.width, staged.height, data, self.info.nodata)))
    }
}

/// Scratch output raster, filled with no-data until sources are written.
///
/// The whole grid and its overviews live in memory as `f64` cells, whatever
/// the profile's data type: a Float32 output needs twice its file size in
/// RAM before any source is read. Profiles flagged `big` are allowed but
/// logged, since they need several GiB.
#[derive(Debug, Clone)]
pub struct ScratchRaster {
    profile: OutputProfile,
    pixels: RasterBlock,
    overviews: Vec<(usize, RasterBlock)>,
}

impl ScratchRaster {
    /// Allocate the full output grid described by `profile`.
    pub fn create(profile: &OutputProfile) -> Self {
        let bytes = Self::memory_bytes(profile);
        if profile.big {
            warn!(
                width = profile.width,
                height = profile.height,
                bytes = bytes,
                "Scratch raster for a big-format profile is held fully in memory"
            );
        } else {
            debug!(
                width = profile.width,
                height = profile.height,
                bytes = bytes,
                "Allocating scratch raster"
            );
        }

        let pixels = RasterBlock::filled(
            profile.width,
            profile.height,
            profile.nodata,
            Some(profile.nodata),
        );
        Self {
            profile: profile.clone(),
            pixels,
            overviews: Vec::new(),
        }
    }

    /// Bytes the full-resolution grid of `profile` takes in memory.
    pub fn memory_bytes(profile: &OutputProfile) -> u64 {
        profile.width as u64 * profile.height as u64 * std::mem::size_of::<f64>() as u64
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &RasterBlock {
        &self.pixels
    }

    pub fn value_at(&self, col: usize, row: usize) -> f64 {
        self.pixels.get(col, row)
    }

    /// Overview levels built so far, as (factor, block).
    pub fn overviews(&self) -> &[(usize, RasterBlock)] {
        &self.overviews
    }

    fn check_window(&self, window: &PixelWindow) -> Result<()> {
        let inside = window.col_off >= 0
            && window.row_off >= 0
            && window.col_end() <= self.profile.width as i64
            && window.row_end() <= self.profile.height as i64;
        if inside {
            Ok(())
        } else {
            Err(MosaicError::WindowOutOfBounds {
                window: format!(
                    "({}, {}, {}x{})",
                    window.col_off, window.row_off, window.width, window.height
                ),
                width: self.profile.width,
                height: self.profile.height,
            })
        }
    }
}

impl RasterSink for ScratchRaster {
    fn profile(&self) -> &OutputProfile {
        &self.profile
    }

    fn read_window(&self, window: &PixelWindow) -> Result<RasterBlock> {
        self.check_window(window)?;

        let mut data = Vec::with_capacity(window.area());
        for row in window.row_off as usize..window.row_end() as usize {
            let start = row * self.profile.width + window.col_off as usize;
            data.extend_from_slice(&self.pixels.data[start..start + window.width]);
        }

        Ok(RasterBlock::new(
            window.width,
            window.height,
            data,
            Some(self.profile.nodata),
        ))
    }

    fn write_window(&mut self, window: &PixelWindow, block: &RasterBlock) -> Result<()> {
        self.check_window(window)?;
        if block.width != window.width || block.height != window.height {
            return Err(MosaicError::Io(format!(
                "block {}x{} does not match window {}x{}",
                block.width, block.height, window.width, window.height
            )));
        }

        for (i, row) in (window.row_off as usize..window.row_end() as usize).enumerate() {
            let start = row * self.profile.width + window.col_off as usize;
            self.pixels.data[start..start + window.width]
                .copy_from_slice(&block.data[i * block.width..(i + 1) * block.width]);
        }
        Ok(())
    }

    fn build_overviews(&mut self, levels: &[usize], method: OverviewResampling) -> Result<()> {
        self.overviews = build_pyramid(&self.pixels, levels, self.profile.nodata, method);
        debug!(levels = ?levels, "Built overviews");
        Ok(())
    }

    fn persist(&self, path: &Path) -> Result<()> {
        geotiff::write_atomic(path, &self.profile, &self.pixels, &self.overviews)
    }
}

/// URL-keyed store of in-memory sources.
#[derive(Default)]
pub struct MemoryStore {
    rasters: HashMap<String, Arc<MemoryRaster>>,
    opened: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raster: MemoryRaster) {
        self.rasters.insert(raster.url().to_string(), Arc::new(raster));
    }

    pub fn get(&self, url: &str) -> Option<&Arc<MemoryRaster>> {
        self.rasters.get(url)
    }

    /// URLs opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl RasterStore for MemoryStore {
    fn open(&self, url: &str) -> Result<Arc<dyn RasterSource>> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }

        self.rasters
            .get(url)
            .map(|r| Arc::clone(r) as Arc<dyn RasterSource>)
            .ok_or_else(|| MosaicError::source_unreadable(url, "no such raster"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::OutputProfileBuilder;
    use crate::types::DataType;

    fn utm() -> Crs {
        Crs::from_epsg(26915)
    }

    fn info(west: f64, north: f64, res: f64, width: usize, height: usize) -> RasterInfo {
        RasterInfo {
            transform: PixelTransform::from_origin(west, north, res, res),
            crs: utm(),
            resolution: res,
            dtype: DataType::Float32,
            nodata: Some(-1.0),
            width,
            height,
            block_size: (256, 256),
            bands: 1,
        }
    }

    fn request(west: f64, north: f64, res: f64, width: usize, height: usize) -> ReadRequest {
        ReadRequest {
            transform: PixelTransform::from_origin(west, north, res, res),
            crs: utm(),
            width,
            height,
            resampling: Resampling::Nearest,
            intermediate: None,
        }
    }

    #[test]
    fn test_read_aligned_window() {
        let data = (0..16).map(|v| v as f64).collect();
        let raster = MemoryRaster::new("mem://a", info(0.0, 4.0, 1.0, 4, 4), data).unwrap();

        let block = raster.read(&request(1.0, 3.0, 1.0, 2, 2)).unwrap();
        assert_eq!(block.data, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_read_outside_is_nodata() {
        let raster = MemoryRaster::new("mem://a", info(0.0, 4.0, 1.0, 4, 4), vec![7.0; 16]).unwrap();
        let block = raster.read(&request(3.0, 4.0, 1.0, 2, 1)).unwrap();
        assert_eq!(block.data, vec![7.0, -1.0]);
    }

    #[test]
    fn test_read_coarser_grid() {
        let data = (0..16).map(|v| v as f64).collect();
        let raster = MemoryRaster::new("mem://a", info(0.0, 4.0, 1.0, 4, 4), data).unwrap();
        let block = raster.read(&request(0.0, 4.0, 2.0, 2, 2)).unwrap();
        assert_eq!(block.width, 2);
        assert_eq!(block.count_valid(), 4);
    }

    /// 0.5 m columns numbered by index, origin a quarter metre east of the
    /// 1 m target grid.
    fn offset_half_metre() -> MemoryRaster {
        let data = (0..64).map(|i| (i % 8) as f64).collect();
        MemoryRaster::new("mem://fine", info(0.25, 4.0, 0.5, 8, 8), data).unwrap()
    }

    #[test]
    fn test_read_direct_without_intermediate() {
        let raster = offset_half_metre();
        let block = raster.read(&request(0.0, 4.0, 1.0, 3, 1)).unwrap();
        assert_eq!(block.data, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_read_through_intermediate_view() {
        let raster = offset_half_metre();
        let mut req = request(0.0, 4.0, 1.0, 3, 1);
        req.intermediate = Some(raster.info().transform.scaled(2.0));

        let block = raster.read(&req).unwrap();
        assert_eq!(block.data, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_aligned_intermediate_matches_direct_read() {
        let data = (0..16).map(|v| v as f64).collect();
        let raster = MemoryRaster::new("mem://a", info(0.0, 4.0, 2.0, 4, 4), data).unwrap();

        let direct = raster.read(&request(0.0, 4.0, 1.0, 8, 8)).unwrap();
        let mut req = request(0.0, 4.0, 1.0, 8, 8);
        req.intermediate = Some(raster.info().transform.scaled(0.5));
        let staged = raster.read(&req).unwrap();

        assert_eq!(direct.data, staged.data);
    }

    #[test]
    fn test_other_crs_without_transformer_fails() {
        let raster = MemoryRaster::new("mem://a", info(0.0, 4.0, 1.0, 4, 4), vec![1.0; 16]).unwrap();
        let mut req = request(0.0, 4.0, 1.0, 2, 2);
        req.crs = Crs::from_epsg(32615);
        assert!(matches!(
            raster.read(&req),
            Err(MosaicError::SourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_multiband_rejected() {
        let mut i = info(0.0, 4.0, 1.0, 4, 4);
        i.bands = 3;
        let raster = MemoryRaster::new("mem://a", i, vec![1.0; 16]).unwrap();
        assert!(raster.read(&request(0.0, 4.0, 1.0, 2, 2)).is_err());
    }

    #[test]
    fn test_sink_window_round_trip() {
        let profile = OutputProfileBuilder::default()
            .build(
                utm(),
                32,
                32,
                PixelTransform::from_origin(0.0, 32.0, 1.0, 1.0),
                Some(16),
                Some(-1.0),
                None,
            )
            .unwrap();
        let mut sink = ScratchRaster::create(&profile);
        assert!(sink.pixels().is_all_nodata());
        assert_eq!(ScratchRaster::memory_bytes(&profile), 32 * 32 * 8);
        assert_eq!(ScratchRaster::memory_bytes(&profile), profile.estimated_bytes() * 2);

        let window = PixelWindow::new(4, 2, 3, 2);
        sink.write_window(&window, &RasterBlock::filled(3, 2, 5.0, Some(-1.0)))
            .unwrap();

        assert_eq!(sink.read_window(&window).unwrap().count_valid(), 6);
        assert_eq!(sink.value_at(4, 2), 5.0);
        assert_eq!(sink.value_at(3, 2), -1.0);
        assert!(sink.read_window(&PixelWindow::new(30, 30, 4, 4)).is_err());
    }

    #[test]
    fn test_store_records_opens() {
        let mut store = MemoryStore::new();
        store.insert(MemoryRaster::new("mem://a", info(0.0, 4.0, 1.0, 4, 4), vec![1.0; 16]).unwrap());

        assert!(store.open("mem://a").is_ok());
        assert!(store.open("mem://missing").is_err());
        assert_eq!(store.opened(), vec!["mem://a".to_string(), "mem://missing".to_string()]);
    }
}
