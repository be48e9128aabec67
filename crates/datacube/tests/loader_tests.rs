//! DataLoader behaviour against an in-memory cube.

use std::sync::Arc;

use chrono::Duration;
use datacube::{
    BudgetConfig, CubeError, DataLoader, Dataset, ExtraQuery, FuseRule, InMemoryDataCube,
    QueryGeometry, SpatioTemporalQuery,
};
use drill_common::{CrsCode, TimeRange};
use ndarray::Array2;
use test_utils::{albers_grid, days_from, fc_product, seed_product, utc, wofs, wofs_product};

fn square(x0: f64, y0: f64, size: f64) -> QueryGeometry {
    QueryGeometry::polygon(
        vec![(x0, y0), (x0 + size, y0), (x0 + size, y0 + size), (x0, y0 + size)],
        CrsCode::Epsg3577,
    )
}

fn wofs_cube() -> InMemoryDataCube {
    let mut cube = InMemoryDataCube::new();
    let times = days_from(utc(2020, 1, 1), &[0, 16, 32]);
    seed_product(&mut cube, wofs_product(), albers_grid(0.0, 100.0, 4, 4), &times, |t, _| {
        Array2::from_elem((4, 4), if t == 1 { wofs::WET } else { wofs::DRY })
    });
    cube
}

#[tokio::test]
async fn test_no_datasets_is_no_data_and_reads_nothing() {
    let cube = Arc::new(wofs_cube());
    let loader = DataLoader::new(cube.clone());

    let query = SpatioTemporalQuery::new("wofs_albers", square(0.0, 0.0, 100.0))
        .with_time(TimeRange::parse("1999-01-01", "1999-12-31").unwrap());

    let err = loader.load(&query).await.unwrap_err();
    assert!(matches!(err, CubeError::NoData(_)));
    assert_eq!(cube.read_count(), 0);
}

#[tokio::test]
async fn test_budget_rejects_before_any_read() {
    let cube = Arc::new(wofs_cube());
    // 16 pixels x 3 slices x 2 bytes = 96 bytes total, 32 per slice
    let loader = DataLoader::new(cube.clone()).with_budget(BudgetConfig {
        max_total_bytes: 64.0,
        max_slice_bytes: 1e9,
    });

    let query = SpatioTemporalQuery::new("wofs_albers", square(0.0, 0.0, 100.0));
    let err = loader.load(&query).await.unwrap_err();

    assert!(matches!(err, CubeError::Budget(_)));
    assert!(err.to_string().starts_with("requested area requires 0GB data to load"));
    assert_eq!(cube.read_count(), 0);
}

#[tokio::test]
async fn test_per_slice_budget_rejects_before_any_read() {
    let cube = Arc::new(wofs_cube());
    let loader = DataLoader::new(cube.clone()).with_budget(BudgetConfig {
        max_total_bytes: 1e9,
        max_slice_bytes: 16.0,
    });

    let query = SpatioTemporalQuery::new("wofs_albers", square(0.0, 0.0, 100.0));
    let err = loader.load(&query).await.unwrap_err();
    assert!(err.to_string().starts_with("requested time slices each requires"));
    assert_eq!(cube.read_count(), 0);
}

#[tokio::test]
async fn test_load_builds_ordered_cube_with_attributes() {
    let cube = Arc::new(wofs_cube());
    let loader = DataLoader::new(cube.clone()).with_concurrency(2);

    let query = SpatioTemporalQuery::new("wofs_albers", square(10.0, 10.0, 60.0));
    let loaded = loader.load(&query).await.unwrap();

    assert_eq!(loaded.times(), &days_from(utc(2020, 1, 1), &[0, 16, 32])[..]);
    // 10..70 snapped outward to 0..75 on the 25 m grid
    assert_eq!(loaded.shape(), (3, 3, 3));

    let water = loaded.band("water").unwrap();
    assert_eq!(water.nodata, Some(1.0));
    assert!(water.flags.as_ref().is_some_and(|f| f.get("wet").is_some()));
    assert_eq!(water.data[[1, 0, 0]], wofs::WET);
    assert_eq!(water.data[[2, 2, 2]], wofs::DRY);
    assert_eq!(cube.read_count(), 3);
}

#[tokio::test]
async fn test_same_solar_day_scenes_are_fused() {
    let mut cube = InMemoryDataCube::new();
    cube.add_product(wofs_product());

    let grid = albers_grid(0.0, 100.0, 4, 4);
    let t0 = utc(2020, 1, 1);

    // First pass: nodata on the left half, dry on the right.
    let first = Array2::from_shape_fn((4, 4), |(_, c)| if c < 2 { wofs::NODATA } else { wofs::DRY });
    // Second pass a minute later: wet everywhere.
    let second = Array2::from_elem((4, 4), wofs::WET);

    cube.add_dataset(Dataset::new("wofs_albers", t0, grid), [("water".to_string(), first)])
        .unwrap();
    cube.add_dataset(
        Dataset::new("wofs_albers", t0 + Duration::minutes(1), grid),
        [("water".to_string(), second)],
    )
    .unwrap();

    let query = SpatioTemporalQuery::new("wofs_albers", square(0.0, 0.0, 100.0)).with_extra(
        ExtraQuery {
            fuse: FuseRule::NodataBit(0),
            ..Default::default()
        },
    );
    let loaded = DataLoader::new(Arc::new(cube)).load(&query).await.unwrap();

    assert_eq!(loaded.len_time(), 1);
    let water = loaded.band("water").unwrap();
    assert_eq!(water.data[[0, 0, 0]], wofs::WET);
    assert_eq!(water.data[[0, 0, 3]], wofs::DRY);
}

#[tokio::test]
async fn test_aliases_name_the_output_bands() {
    let mut cube = InMemoryDataCube::new();
    seed_product(
        &mut cube,
        fc_product(),
        albers_grid(0.0, 100.0, 4, 4),
        &[utc(2018, 6, 1)],
        |_, band| Array2::from_elem((4, 4), if band == "PV" { 40.0 } else { 20.0 }),
    );

    let query = SpatioTemporalQuery::new("ls8_fc_albers", square(0.0, 0.0, 100.0))
        .with_measurements(["pv", "BS"]);
    let loaded = DataLoader::new(Arc::new(cube)).load(&query).await.unwrap();

    assert_eq!(loaded.band_names().collect::<Vec<_>>(), vec!["BS", "pv"]);
    assert_eq!(loaded.band("pv").unwrap().data[[0, 0, 0]], 40.0);
    assert_eq!(loaded.band("pv").unwrap().nodata, Some(-1.0));
}

#[tokio::test]
async fn test_broken_datasets() {
    let mut cube = InMemoryDataCube::new();
    cube.add_product(wofs_product());
    let grid = albers_grid(0.0, 100.0, 4, 4);
    let t0 = utc(2020, 1, 1);

    // No raster registered: every read of this dataset fails.
    cube.add_dataset(Dataset::new("wofs_albers", t0, grid), Vec::new())
        .unwrap();
    cube.add_dataset(
        Dataset::new("wofs_albers", t0 + Duration::minutes(1), grid),
        [("water".to_string(), Array2::from_elem((4, 4), wofs::WET))],
    )
    .unwrap();
    let cube = Arc::new(cube);

    let query = SpatioTemporalQuery::new("wofs_albers", square(0.0, 0.0, 100.0));
    let err = DataLoader::new(cube.clone()).load(&query).await.unwrap_err();
    assert!(matches!(err, CubeError::ReadFailed { .. }));

    let query = query.with_extra(ExtraQuery {
        skip_broken_datasets: true,
        ..Default::default()
    });
    let loaded = DataLoader::new(cube).load(&query).await.unwrap();
    assert_eq!(loaded.band("water").unwrap().data[[0, 1, 1]], wofs::WET);
}
