//! In-process data cube holding rasters in memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ndarray::Array2;

use super::{dataset_matches, DataCube};
use crate::error::{CubeError, CubeResult};
use crate::query::SpatioTemporalQuery;
use crate::types::{Dataset, Measurement, Product};

/// Data cube backed by maps of products, datasets and rasters.
///
/// Populate it before sharing; reads are counted so callers can check
/// whether any raster was touched.
#[derive(Debug, Default)]
pub struct InMemoryDataCube {
    products: HashMap<String, Product>,
    datasets: Vec<Dataset>,
    rasters: HashMap<(uuid::Uuid, String), Array2<f32>>,
    reads: AtomicUsize,
}

impl InMemoryDataCube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.insert(product.name.clone(), product);
    }

    /// Register a dataset with its band rasters, keyed by measurement name.
    /// Each raster must match the dataset grid.
    pub fn add_dataset<I>(&mut self, dataset: Dataset, rasters: I) -> CubeResult<()>
    where
        I: IntoIterator<Item = (String, Array2<f32>)>,
    {
        let mut dataset = dataset;
        for (band, raster) in rasters {
            if raster.dim() != dataset.grid.shape() {
                return Err(CubeError::ShapeMismatch(format!(
                    "raster for {} is {:?}, dataset grid is {:?}",
                    band,
                    raster.dim(),
                    dataset.grid.shape()
                )));
            }
            dataset
                .bands
                .entry(band.clone())
                .or_insert_with(|| format!("memory/{}/{}", dataset.id, band));
            self.rasters.insert((dataset.id, band), raster);
        }
        self.datasets.push(dataset);
        Ok(())
    }

    /// Number of `read_band` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }
}

#[async_trait]
impl DataCube for InMemoryDataCube {
    async fn product(&self, name: &str) -> CubeResult<Product> {
        self.products
            .get(name)
            .cloned()
            .ok_or_else(|| CubeError::ProductNotFound(name.to_string()))
    }

    async fn find_datasets(&self, query: &SpatioTemporalQuery) -> CubeResult<Vec<Dataset>> {
        let mut found = Vec::new();
        for dataset in &self.datasets {
            if dataset_matches(dataset, query)? {
                found.push(dataset.clone());
            }
        }
        found.sort_by_key(|d| d.time);
        Ok(found)
    }

    async fn read_band(
        &self,
        dataset: &Dataset,
        measurement: &Measurement,
    ) -> CubeResult<Array2<f32>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.rasters
            .get(&(dataset.id, measurement.name.clone()))
            .cloned()
            .ok_or_else(|| CubeError::read_failed(dataset.id, &measurement.name, "no such band"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::QueryGeometry;
    use crate::types::DType;
    use chrono::{TimeZone, Utc};
    use drill_common::{Affine, CrsCode, GeoBox, TimeRange};

    fn cube() -> InMemoryDataCube {
        let mut cube = InMemoryDataCube::new();
        cube.add_product(Product {
            name: "wofs_albers".into(),
            description: String::new(),
            measurements: vec![Measurement::new("water", DType::UInt8, Some(1.0))],
            grid_spec: None,
        });

        let grid = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 100.0, 25.0, -25.0), 4, 4);
        for (day, x0) in [(1, 0.0), (2, 1000.0)] {
            let mut g = grid;
            g.transform.origin_x = x0;
            let ds = Dataset::new(
                "wofs_albers",
                Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap(),
                g,
            );
            cube.add_dataset(ds, [("water".to_string(), Array2::zeros((4, 4)))])
                .unwrap();
        }
        cube
    }

    #[tokio::test]
    async fn test_find_datasets_filters_space_and_time() {
        let cube = cube();
        let geometry = QueryGeometry::point(50.0, 50.0, CrsCode::Epsg3577);

        let query = SpatioTemporalQuery::new("wofs_albers", geometry.clone());
        assert_eq!(cube.find_datasets(&query).await.unwrap().len(), 1);

        let query = SpatioTemporalQuery::new("wofs_albers", geometry)
            .with_time(TimeRange::single("2020-01-02").unwrap());
        assert!(cube.find_datasets(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_counts() {
        let cube = cube();
        let query = SpatioTemporalQuery::new(
            "wofs_albers",
            QueryGeometry::point(1010.0, 50.0, CrsCode::Epsg3577),
        );
        let datasets = cube.find_datasets(&query).await.unwrap();
        let product = cube.product("wofs_albers").await.unwrap();

        let raster = cube
            .read_band(&datasets[0], &product.measurements[0])
            .await
            .unwrap();
        assert_eq!(raster.dim(), (4, 4));
        assert_eq!(cube.read_count(), 1);
        assert!(matches!(
            cube.product("nope").await,
            Err(CubeError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_add_dataset_checks_shape() {
        let mut cube = InMemoryDataCube::new();
        let grid = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 0.0, 1.0, -1.0), 2, 2);
        let ds = Dataset::new("p", Utc::now(), grid);
        assert!(cube
            .add_dataset(ds, [("b".to_string(), Array2::zeros((3, 3)))])
            .is_err());
    }
}
