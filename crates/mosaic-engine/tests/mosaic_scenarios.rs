//! End-to-end compositing scenarios on in-memory sources.

use std::sync::Arc;

use chip_common::{BoundingBox, Crs, PixelTransform, SourceDescriptor};
use mosaic_engine::{
    shared_output_grid, DataType, EngineConfig, ExtractionPlanner, JobContext, MemoryRaster,
    MemoryStore, MosaicCompositor, MosaicError, MosaicJob, MosaicRequest, MosaicResult, NativeGrid,
    OutputProfileBuilder, PlannedSource, ProfileDefaults, RasterInfo, RasterSource, RasterStore,
    ReadStrategy, Resampling, SameCrsTransformer, ScratchRaster, SkipReason,
};
use test_utils::{
    bbox, bbox_of, create_constant_grid, create_partial_grid, init_tracing, memory_url,
    output_tif, source, temp_test_dir, utm15n,
};

const WEST: f64 = 500_000.0;
const NORTH: f64 = 4_500_000.0;
const NODATA: f64 = -9999.0;

/// A square single-band raster anchored at (`west`, `north`).
fn raster(id: &str, west: f64, north: f64, res: f64, size: usize, data: Vec<f64>) -> MemoryRaster {
    let info = RasterInfo {
        transform: PixelTransform::from_origin(west, north, res, res),
        crs: utm15n(),
        resolution: res,
        dtype: DataType::Float32,
        nodata: Some(NODATA),
        width: size,
        height: size,
        block_size: (64, 64),
        bands: 1,
    };
    MemoryRaster::new(memory_url(id), info, data).unwrap()
}

fn constant(id: &str, west: f64, north: f64, size: usize, value: f64) -> MemoryRaster {
    raster(id, west, north, 1.0, size, create_constant_grid(size, size, value))
}

/// Plan and composite `sources` onto a 1 m grid covering `extent`, keeping
/// the scratch output for inspection.
fn composite(
    store: &MemoryStore,
    sources: &[SourceDescriptor],
    extent: BoundingBox,
    strategy: ReadStrategy,
    short_circuit: bool,
) -> (MosaicResult, ScratchRaster) {
    let ctx = JobContext::default();
    let resolutions: Vec<f64> = sources.iter().map(|s| s.resolution).collect();
    let grid = shared_output_grid(&resolutions, &extent, &utm15n(), 1.0, &SameCrsTransformer).unwrap();

    let planner = ExtractionPlanner::new(Arc::new(SameCrsTransformer));
    let planned: Vec<PlannedSource> = sources
        .iter()
        .map(|s| {
            let info = store.get(&s.url).unwrap().info().clone();
            let plan = planner
                .derive_params(&NativeGrid::from(&info), &grid, Resampling::Nearest)
                .unwrap();
            PlannedSource::new(s.clone(), plan)
        })
        .collect();

    let profile = OutputProfileBuilder::new(ProfileDefaults::default())
        .from_grid(&grid, DataType::Float32, NODATA)
        .unwrap();
    let mut sink = ScratchRaster::create(&profile);

    let dir = temp_test_dir();
    let result = MosaicCompositor::new(&ctx)
        .with_strategy(strategy)
        .with_short_circuit(short_circuit)
        .composite(&planned, store, &mut sink, &output_tif(&dir, "mosaic"))
        .unwrap();
    (result, sink)
}

/// A: 50 px of value 1 in the north-west corner. B: 300 px of value 3.
/// C: 100 px of value 7, entirely inside B.
fn abc_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert(constant("a", WEST, NORTH, 50, 1.0));
    store.insert(constant("b", WEST, NORTH, 300, 3.0));
    store.insert(constant("c", WEST + 100.0, NORTH - 100.0, 100, 7.0));
    store
}

fn extent_300() -> BoundingBox {
    BoundingBox::new(WEST, NORTH - 300.0, WEST + 300.0, NORTH, utm15n())
}

#[test]
fn test_priority_order_two_sources() {
    init_tracing();
    let mut store = MemoryStore::new();
    store.insert(constant("a", WEST, NORTH, 500, 1.0));
    store.insert(constant("b", WEST, NORTH, 3000, 3.0));
    let sources = vec![source("a", 1.0), source("b", 1.0)];

    let (result, sink) = composite(
        &store,
        &sources,
        bbox_of(bbox::SQUARE_3KM, utm15n()),
        ReadStrategy::Windowed,
        true,
    );

    assert_eq!(result.used, vec!["a".to_string(), "b".to_string()]);
    assert!(result.unused.is_empty());
    assert_eq!((sink.pixels().width, sink.pixels().height), (3000, 3000));
    // Under A's footprint.
    assert_eq!(sink.value_at(10, 10), 1.0);
    assert_eq!(sink.value_at(499, 499), 1.0);
    // B only.
    assert_eq!(sink.value_at(500, 499), 3.0);
    assert_eq!(sink.value_at(2999, 2999), 3.0);
    assert_eq!(sink.pixels().count_valid(), 3000 * 3000);
}

#[test]
fn test_covered_source_is_unused() {
    let store = abc_store();
    let ab = vec![source("a", 1.0), source("b", 1.0)];
    let abc = vec![source("a", 1.0), source("b", 1.0), source("c", 1.0)];

    let (_, ab_sink) = composite(&store, &ab, extent_300(), ReadStrategy::Windowed, true);
    let (result, abc_sink) = composite(&store, &abc, extent_300(), ReadStrategy::Windowed, true);

    assert_eq!(result.used, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(result.unused_ids(), vec!["c"]);
    assert_eq!(result.unused[0].reason, SkipReason::AlreadyCovered);
    assert_eq!(ab_sink.pixels(), abc_sink.pixels());
}

#[test]
fn test_short_circuit_skips_open() {
    let store = abc_store();
    let abc = vec![source("a", 1.0), source("b", 1.0), source("c", 1.0)];

    composite(&store, &abc, extent_300(), ReadStrategy::Windowed, true);

    assert!(!store.opened().contains(&memory_url("c")));
    assert_eq!(store.get(&memory_url("c")).unwrap().read_count(), 0);
}

#[test]
fn test_short_circuit_does_not_change_output() {
    let store = abc_store();
    let abc = vec![source("a", 1.0), source("b", 1.0), source("c", 1.0)];

    let (on, on_sink) = composite(&store, &abc, extent_300(), ReadStrategy::Windowed, true);
    let (off, off_sink) = composite(&store, &abc, extent_300(), ReadStrategy::Windowed, false);

    assert_eq!(on_sink.pixels(), off_sink.pixels());
    assert_eq!(on.used, off.used);
    assert_eq!(on.unused_ids(), off.unused_ids());
    assert_eq!(off.unused[0].reason, SkipReason::NoNewPixels);
}

#[test]
fn test_strategies_agree() {
    let store = abc_store();
    let abc = vec![source("a", 1.0), source("b", 1.0), source("c", 1.0)];

    let (whole, whole_sink) = composite(&store, &abc, extent_300(), ReadStrategy::Whole, true);
    for strategy in [ReadStrategy::Windowed, ReadStrategy::ParallelWindowed] {
        let (result, sink) = composite(&store, &abc, extent_300(), strategy, true);
        assert_eq!(sink.pixels(), whole_sink.pixels(), "{} differs from whole", strategy);
        assert_eq!(result.used, whole.used);
        assert_eq!(result.unused_ids(), whole.unused_ids());
    }
}

#[test]
fn test_nodata_holes_filled_by_lower_priority() {
    let mut store = MemoryStore::new();
    store.insert(raster(
        "a",
        WEST,
        NORTH,
        1.0,
        100,
        create_partial_grid(100, 100, 1.0, NODATA, 40),
    ));
    store.insert(constant("b", WEST, NORTH, 100, 3.0));
    let sources = vec![source("a", 1.0), source("b", 1.0)];
    let extent = BoundingBox::new(WEST, NORTH - 100.0, WEST + 100.0, NORTH, utm15n());

    for strategy in [ReadStrategy::Whole, ReadStrategy::Windowed, ReadStrategy::ParallelWindowed] {
        let (result, sink) = composite(&store, &sources, extent, strategy, true);
        assert_eq!(result.used, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(sink.value_at(39, 0), 3.0);
        assert_eq!(sink.value_at(40, 0), 1.0);
    }
}

#[test]
fn test_empty_source_is_unused() {
    let mut store = MemoryStore::new();
    store.insert(constant("a", WEST, NORTH, 100, NODATA));
    store.insert(constant("b", WEST, NORTH, 100, 3.0));
    let sources = vec![source("a", 1.0), source("b", 1.0)];
    let extent = BoundingBox::new(WEST, NORTH - 100.0, WEST + 100.0, NORTH, utm15n());

    for strategy in [ReadStrategy::Whole, ReadStrategy::Windowed] {
        let (result, _) = composite(&store, &sources, extent, strategy, true);
        assert_eq!(result.used, vec!["b".to_string()]);
        assert_eq!(result.unused[0].reason, SkipReason::EmptySource);
    }
}

#[test]
fn test_coarser_source_is_resampled() {
    let mut store = MemoryStore::new();
    store.insert(raster("a", WEST, NORTH, 2.0, 10, create_constant_grid(10, 10, 5.0)));
    let sources = vec![source("a", 2.0)];
    let extent = BoundingBox::new(WEST, NORTH - 20.0, WEST + 20.0, NORTH, utm15n());

    let (result, sink) = composite(&store, &sources, extent, ReadStrategy::Windowed, true);
    assert_eq!(result.used, vec!["a".to_string()]);
    assert_eq!(sink.pixels().width, 20);
    assert_eq!(sink.pixels().count_valid(), 400);
}

#[test]
fn test_windowed_reads_follow_source_blocks() {
    for strategy in [ReadStrategy::Windowed, ReadStrategy::ParallelWindowed] {
        let mut store = MemoryStore::new();
        // One 64 px block, offset 5 px from the output's 64 px multiples.
        store.insert(constant("off", WEST + 5.0, NORTH - 5.0, 64, 2.0));

        let (result, sink) = composite(&store, &[source("off", 1.0)], extent_300(), strategy, true);

        assert_eq!(result.used, vec!["off".to_string()]);
        assert_eq!(sink.pixels().count_valid(), 64 * 64);
        assert_eq!(store.get(&memory_url("off")).unwrap().read_count(), 1);
    }
}

#[test]
fn test_job_warns_when_resolutions_have_no_common_multiple() {
    let resolutions = [0.79, 0.83, 0.89, 0.97, 1.01, 1.03, 1.07, 1.09, 1.13, 1.27];
    let mut store = MemoryStore::new();
    let mut sources = Vec::new();
    for (i, res) in resolutions.iter().enumerate() {
        let id = format!("r{}", i);
        store.insert(raster(&id, WEST, NORTH, *res, 20, create_constant_grid(20, 20, i as f64 + 1.0)));
        sources.push(source(&id, *res));
    }

    let dir = temp_test_dir();
    let request = MosaicRequest {
        bbox: BoundingBox::new(WEST, NORTH - 10.0, WEST + 10.0, NORTH, utm15n()),
        out_crs: utm15n(),
        out_resolution: 1.0,
        output_path: output_tif(&dir, "coprime"),
    };

    let ctx = JobContext::new(EngineConfig::default());
    let result = MosaicJob::new(&ctx, &store, Arc::new(SameCrsTransformer))
        .run(&sources, &request)
        .unwrap();

    assert_eq!(result.used, vec!["r0".to_string()]);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("common multiple"));
}

#[test]
fn test_job_reports_unreadable_and_disjoint_sources() {
    init_tracing();
    let mut store = MemoryStore::new();
    store.insert(constant("a", WEST, NORTH, 100, 1.0));
    let (dw, _, _, dn) = bbox::DISJOINT;
    store.insert(constant("far", dw, dn, 100, 2.0));

    let sources = vec![
        source("missing", 1.0),
        source("a", 1.0),
        source("far", 1.0),
    ];
    let dir = temp_test_dir();
    let request = MosaicRequest {
        bbox: BoundingBox::new(WEST, NORTH - 100.0, WEST + 100.0, NORTH, utm15n()),
        out_crs: utm15n(),
        out_resolution: 1.0,
        output_path: output_tif(&dir, "job"),
    };

    let ctx = JobContext::new(EngineConfig::default());
    let result = MosaicJob::new(&ctx, &store, Arc::new(SameCrsTransformer))
        .run(&sources, &request)
        .unwrap();

    assert_eq!(result.used, vec!["a".to_string()]);
    assert_eq!(result.unused_ids(), vec!["missing", "far"]);
    assert!(matches!(result.unused[0].reason, SkipReason::Unreadable(_)));
    assert_eq!(result.unused[1].reason, SkipReason::NoOverlap);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("missing"));
    assert!(request.output_path.exists());
}

#[test]
fn test_job_rejects_geographic_output() {
    let store = MemoryStore::new();
    let dir = temp_test_dir();
    let request = MosaicRequest {
        bbox: BoundingBox::new(-93.0, 40.0, -92.0, 41.0, Crs::wgs84()),
        out_crs: Crs::wgs84(),
        out_resolution: 0.001,
        output_path: output_tif(&dir, "geo"),
    };

    let ctx = JobContext::default();
    let err = MosaicJob::new(&ctx, &store, Arc::new(SameCrsTransformer))
        .run(&[source("a", 1.0)], &request)
        .unwrap_err();
    assert!(matches!(err, MosaicError::UnsupportedOutputCrs(_)));
    assert!(store.opened().is_empty());
}

#[test]
fn test_store_trait_object() {
    let store = abc_store();
    let dyn_store: &dyn RasterStore = &store;
    assert_eq!(dyn_store.open(&memory_url("a")).unwrap().info().width, 50);
}
