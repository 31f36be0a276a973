//! End-to-end scenario tests on synthetic NLCD-style rasters around the
//! San Antonio parcel.

use projection::Reprojector;
use raster_engine::geotiff::count_overviews;
use raster_engine::overview::generate_overviews;
use raster_engine::resample::warp_nearest;
use raster_engine::window::{polygon_bounds, snap_covering};
use raster_engine::{
    read_raster, write_raster, EngineConfig, EngineError, GeoTransform, GridReference, Raster,
    RasterGrid, ScenarioEngine, WriteOptions,
};
use scenario_common::{CrsCode, SpatialReference};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_utils::{
    assert_fractions_eq, classes, grid, indexed_class_grid, rectangle_wkt,
    san_antonio_parcel_wkt, san_antonio_pattern_wkt, temp_test_dir_with_prefix,
    uniform_class_grid,
};

const REFERENCE_SIZE: usize = 200;

fn albers() -> SpatialReference {
    CrsCode::Epsg5070.into()
}

fn write_lulc(path: &Path, origin: (f64, f64), size: usize, data: Vec<u16>, nodata: Option<u16>) {
    let grid = RasterGrid::new(
        GeoTransform::new(origin.0, grid::PIXEL_SIZE, origin.1, -grid::PIXEL_SIZE),
        size,
        size,
        albers(),
    );
    let raster = Raster::from_data(grid, data, nodata).unwrap();
    write_raster(path, &raster, &WriteOptions::default()).unwrap();
}

struct Scenario {
    dir: TempDir,
    reference: PathBuf,
    engine: ScenarioEngine,
}

impl Scenario {
    fn new(origin: (f64, f64), data: Vec<u16>) -> Self {
        Self::with_config(origin, data, |_| {})
    }

    fn with_config(origin: (f64, f64), data: Vec<u16>, tweak: impl FnOnce(&mut EngineConfig)) -> Self {
        let dir = temp_test_dir_with_prefix("scenario_");
        let reference = dir.path().join("NLCD_2016.tif");
        write_lulc(&reference, origin, REFERENCE_SIZE, data, Some(classes::NODATA));

        let mut config = EngineConfig {
            reference_candidates: vec![dir.path().join("missing.tif"), reference.clone()],
            scratch_dir: Some(dir.path().join("scratch")),
            ..Default::default()
        };
        tweak(&mut config);
        let engine = ScenarioEngine::new(config).unwrap();
        Self {
            dir,
            reference,
            engine,
        }
    }

    fn uniform(origin: (f64, f64)) -> Self {
        Self::new(
            origin,
            uniform_class_grid(REFERENCE_SIZE, REFERENCE_SIZE, classes::BASE_CLASS),
        )
    }

    fn indexed(tweak: impl FnOnce(&mut EngineConfig)) -> Self {
        Self::with_config(
            grid::ORIGIN_40_PX,
            indexed_class_grid(REFERENCE_SIZE, REFERENCE_SIZE, 100),
            tweak,
        )
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn tabulation_source(dir: &Path, center: u16, nodata: Option<u16>) -> PathBuf {
    let size = grid::TABULATION_SOURCE_SIZE;
    let mut data = uniform_class_grid(size, size, classes::BASE_CLASS);
    let (row, col) = grid::TABULATION_CENTER_PIXEL;
    data[row * size + col] = center;
    let path = dir.join("tabulation_source.tif");
    write_lulc(&path, grid::TABULATION_SOURCE_ORIGIN, size, data, nodata);
    path
}

#[test]
fn test_fill_pixel_accounting() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let target = scenario.path("fill.tif");

    scenario
        .engine
        .fill_parcel(&san_antonio_parcel_wkt(), classes::FILL_CLASS, &target)
        .unwrap();

    let raster = read_raster(&target).unwrap();
    assert_eq!(raster.count_value(classes::FILL_CLASS), 40);
    assert_eq!(raster.sum_valid(), 600);
    assert_eq!(raster.nodata(), Some(classes::NODATA));
}

#[test]
fn test_fill_depends_on_grid_phase() {
    let scenario = Scenario::uniform(grid::ORIGIN_41_PX);
    let target = scenario.path("fill.tif");

    let raster = scenario
        .engine
        .fill_parcel(&san_antonio_parcel_wkt(), classes::FILL_CLASS, &target)
        .unwrap();
    assert_eq!(raster.count_value(classes::FILL_CLASS), 41);
    assert_eq!(raster.sum_valid(), 615);
}

#[test]
fn test_fill_is_idempotent() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let first = scenario.path("first.tif");
    let second = scenario.path("second.tif");

    let wkt = san_antonio_parcel_wkt();
    scenario.engine.fill_parcel(&wkt, classes::FILL_CLASS, &first).unwrap();
    scenario.engine.fill_parcel(&wkt, classes::FILL_CLASS, &second).unwrap();

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn test_fill_output_is_aligned_to_reference() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let target = scenario.path("fill.tif");
    scenario
        .engine
        .fill_parcel(&san_antonio_parcel_wkt(), classes::FILL_CLASS, &target)
        .unwrap();

    let raster = read_raster(&target).unwrap();
    let transform = raster.grid().transform;
    let (ox, oy) = grid::ORIGIN_40_PX;
    for (edge, origin) in [(transform.origin_x, ox), (transform.origin_y, oy)] {
        let steps = (edge - origin) / grid::PIXEL_SIZE;
        assert!((steps - steps.round()).abs() < 1e-9, "edge {edge} off the lattice");
    }
    assert_eq!(raster.grid().spatial_ref, albers());

    // the buffered window contains the whole parcel envelope
    let bounds = raster.grid().bounds();
    let (min_x, min_y, max_x, max_y) = test_utils::parcel::BOUNDS_5070;
    assert!(bounds.min_x < min_x && bounds.max_x > max_x);
    assert!(bounds.min_y < min_y && bounds.max_y > max_y);
}

#[test]
fn test_fill_rejects_degenerate_parcel() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let target = scenario.path("fill.tif");
    let err = scenario
        .engine
        .fill_parcel("POLYGON((0 0, 1 1, 2 2, 0 0))", classes::FILL_CLASS, &target)
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyGeometry(_)), "{err:?}");
    assert!(!target.exists());
}

#[test]
fn test_tabulation_known_values() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let source = tabulation_source(scenario.dir.path(), classes::CENTER_CLASS, None);

    let counts = scenario
        .engine
        .pixel_counts_under_parcel(&san_antonio_parcel_wkt(), &source)
        .unwrap();

    assert_eq!(counts.count(classes::BASE_CLASS), 40);
    assert_eq!(counts.count(classes::CENTER_CLASS), 1);
    assert_eq!(counts.total(), 41);
    assert_fractions_eq!(
        counts.fractions(),
        [(classes::BASE_CLASS, 0.9756), (classes::CENTER_CLASS, 0.0244)],
        1e-9
    );
    let sum: f64 = counts.fractions().values().sum();
    assert!((sum - 1.0).abs() < 1e-3);
}

#[test]
fn test_tabulation_excludes_nodata() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let source = tabulation_source(scenario.dir.path(), classes::NODATA, Some(classes::NODATA));

    let counts = scenario
        .engine
        .pixel_counts_under_parcel(&san_antonio_parcel_wkt(), &source)
        .unwrap();
    assert_eq!(counts.total(), 40);
    assert_fractions_eq!(counts.fractions(), [(classes::BASE_CLASS, 1.0)], 1e-9);
}

#[test]
fn test_tabulation_outside_source_is_out_of_bounds() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let far_away = scenario.path("far_away.tif");
    write_lulc(
        &far_away,
        (1_000_000.0, 2_000_000.0),
        4,
        uniform_class_grid(4, 4, 11),
        None,
    );

    let err = scenario
        .engine
        .pixel_counts_under_parcel(&san_antonio_parcel_wkt(), &far_away)
        .unwrap_err();
    assert!(matches!(err, EngineError::OutOfBounds { .. }), "{err:?}");
}

#[test]
fn test_tabulation_of_filled_raster() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let target = scenario.path("fill.tif");
    let wkt = san_antonio_parcel_wkt();
    scenario.engine.fill_parcel(&wkt, classes::FILL_CLASS, &target).unwrap();

    let counts = scenario.engine.pixel_counts_under_parcel(&wkt, &target).unwrap();
    assert_eq!(counts.iter().collect::<Vec<_>>(), vec![(classes::FILL_CLASS, 40)]);
}

/// Pattern tile the wallpaper engine should cut from `source`.
fn expected_pattern(scenario: &Scenario) -> Raster {
    let reprojector = Reprojector::new(CrsCode::Epsg3857.into(), albers()).unwrap();
    let pattern = reprojector.reproject(&san_antonio_pattern_wkt()).unwrap();
    let source = read_raster(&scenario.reference).unwrap();
    let window = snap_covering(&polygon_bounds(&pattern).unwrap(), &source.grid().transform).unwrap();
    let pattern_grid = window.grid(&source.grid().transform, albers());
    warp_nearest(&source, &pattern_grid, classes::NODATA).unwrap()
}

#[test]
fn test_wallpaper_tiles_pattern_inside_parcel_only() {
    let scenario = Scenario::indexed(|_| {});
    let target = scenario.path("wallpaper.tif");
    let mask_path = scenario.path("mask.tif");
    let wkt = san_antonio_parcel_wkt();

    let out = scenario
        .engine
        .wallpaper_parcel(&wkt, &san_antonio_pattern_wkt(), &scenario.reference, &target, None)
        .unwrap();
    let mask = scenario.engine.fill_parcel(&wkt, 1, &mask_path).unwrap();

    // same size, pixel size, bounding box and CRS as the parcel mask
    assert_eq!(out.grid(), mask.grid());
    assert_eq!(read_raster(&target).unwrap(), out);

    let source = read_raster(&scenario.reference).unwrap();
    let base = warp_nearest(&source, out.grid(), classes::NODATA).unwrap();
    let pattern = expected_pattern(&scenario);
    let (pw, ph) = (pattern.width(), pattern.height());

    let mut inside = 0;
    for row in 0..out.height() {
        for col in 0..out.width() {
            let value = out.get(col, row).unwrap();
            if mask.get(col, row) == Some(1) {
                inside += 1;
                assert_eq!(value, pattern.get(col % pw, row % ph).unwrap(), "parcel pixel ({col}, {row})");
            } else {
                assert_eq!(value, base.get(col, row).unwrap(), "context pixel ({col}, {row})");
            }
        }
    }
    assert_eq!(inside, 40);
}

#[test]
fn test_wallpaper_is_seamless_across_block_sizes() {
    let small = Scenario::indexed(|config| config.block_size = 16);
    let large = Scenario::indexed(|config| config.block_size = 256);
    let wkt = san_antonio_parcel_wkt();
    let pattern = san_antonio_pattern_wkt();

    let a = small
        .engine
        .wallpaper_parcel(&wkt, &pattern, &small.reference, &small.path("a.tif"), None)
        .unwrap();
    let b = large
        .engine
        .wallpaper_parcel(&wkt, &pattern, &large.reference, &large.path("b.tif"), None)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_wallpaper_writes_overviews() {
    let scenario = Scenario::indexed(|config| config.overview_min_dimension = 2);
    let target = scenario.path("wallpaper.tif");
    let out = scenario
        .engine
        .wallpaper_parcel(
            &san_antonio_parcel_wkt(),
            &san_antonio_pattern_wkt(),
            &scenario.reference,
            &target,
            None,
        )
        .unwrap();

    let expected = generate_overviews(&out, 2).len();
    assert!(expected > 0);
    assert_eq!(count_overviews(&target).unwrap(), expected);
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn test_wallpaper_removes_scratch_on_success() {
    let scenario = Scenario::indexed(|_| {});
    let working = scenario.path("work");
    std::fs::create_dir_all(&working).unwrap();

    scenario
        .engine
        .wallpaper_parcel(
            &san_antonio_parcel_wkt(),
            &san_antonio_pattern_wkt(),
            &scenario.reference,
            &scenario.path("wallpaper.tif"),
            Some(&working),
        )
        .unwrap();
    assert!(dir_is_empty(&working));
}

#[test]
fn test_wallpaper_rejects_source_in_other_crs() {
    let scenario = Scenario::indexed(|_| {});
    let working = scenario.path("work");
    std::fs::create_dir_all(&working).unwrap();

    let mercator_source = scenario.path("mercator.tif");
    let grid = RasterGrid::new(
        GeoTransform::new(-10_966_000.0, 30.0, 3_431_000.0, -30.0),
        80,
        80,
        CrsCode::Epsg3857.into(),
    );
    write_raster(
        &mercator_source,
        &Raster::filled(grid, 21, None),
        &WriteOptions::default(),
    )
    .unwrap();

    let target = scenario.path("wallpaper.tif");
    let err = scenario
        .engine
        .wallpaper_parcel(
            &san_antonio_parcel_wkt(),
            &san_antonio_pattern_wkt(),
            &mercator_source,
            &target,
            Some(&working),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Projection(_)), "{err:?}");
    assert!(!target.exists());
    assert!(dir_is_empty(&working));
}

#[test]
fn test_wallpaper_rejects_degenerate_pattern() {
    let scenario = Scenario::indexed(|_| {});
    let (x, y) = test_utils::parcel::PATTERN_CENTER_3857;
    let flat = rectangle_wkt(x, y, x + 50.0, y);
    let err = scenario
        .engine
        .wallpaper_parcel(
            &san_antonio_parcel_wkt(),
            &flat,
            &scenario.reference,
            &scenario.path("wallpaper.tif"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyGeometry(_)), "{err:?}");
}

#[test]
fn test_stale_cancellation_is_cleared() {
    let scenario = Scenario::indexed(|config| config.block_size = 16);
    let target = scenario.path("wallpaper.tif");
    let cancel = scenario.engine.cancel_flag();

    // a cancellation requested before the call is cleared when it starts
    cancel.cancel();
    assert!(scenario
        .engine
        .wallpaper_parcel(
            &san_antonio_parcel_wkt(),
            &san_antonio_pattern_wkt(),
            &scenario.reference,
            &target,
            None,
        )
        .is_ok());
    assert!(!cancel.is_cancelled());
    assert!(target.exists());
}

#[test]
fn test_reference_unavailable() {
    let config = EngineConfig {
        reference_candidates: vec![PathBuf::from("/nonexistent/NLCD_2016.tif")],
        ..Default::default()
    };
    let err = ScenarioEngine::new(config).unwrap_err();
    assert!(matches!(err, EngineError::ReferenceUnavailable { .. }));
}

#[test]
fn test_invalid_config_rejected() {
    let config = EngineConfig {
        block_size: 0,
        ..Default::default()
    };
    assert!(matches!(ScenarioEngine::new(config), Err(EngineError::Config(_))));
}

#[test]
fn test_classnames_from_sidecar() {
    let scenario = Scenario::uniform(grid::ORIGIN_40_PX);
    let sidecar = raster_engine::classnames::sidecar_path(&scenario.reference);
    std::fs::write(
        &sidecar,
        r#"<PAMDataset><PAMRasterBand band="1">
  <ColorTable>
    <Entry c1="0" c2="0" c3="0" c4="0"/>
    <Entry c1="70" c2="107" c3="159" c4="255"/>
  </ColorTable>
  <GDALRasterAttributeTable>
    <FieldDefn index="0"><Name>NLCD Land Cover Class</Name></FieldDefn>
    <Row index="0"><F>Unclassified</F></Row>
    <Row index="1"><F>Open Water</F></Row>
  </GDALRasterAttributeTable>
</PAMRasterBand></PAMDataset>"#,
    )
    .unwrap();

    let classes = scenario.engine.classnames(None).unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[&1].name, "Open Water");
    assert_eq!(classes[&1].color.as_deref(), Some("#466b9f"));
}

#[test]
fn test_grid_reference_from_real_nlcd() {
    let path = test_utils::require_test_file!("NLCD_2016.tif");
    let grid = GridReference::load(&[path]).unwrap();
    assert_eq!(grid.pixel_size(), (30.0, -30.0));
    assert!(grid.spatial_reference().is_equivalent(&albers()));
}
