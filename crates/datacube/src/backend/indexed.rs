//! Data cube indexed in an object store.
//!
//! Layout under the index root:
//!
//! ```text
//! products/{product}.json        product definition
//! datasets/{product}.json        JSON array of dataset documents
//! bands/{dataset-id}/{band}.raw  raw little-endian raster per band
//! ```
//!
//! Band keys inside dataset documents are relative to the root, so an index
//! can be copied between buckets or onto local disk unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array2;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, instrument};

use super::{codec, dataset_matches, DataCube};
use crate::error::{CubeError, CubeResult};
use crate::query::SpatioTemporalQuery;
use crate::types::{Dataset, Measurement, Product};

/// Data cube reading index documents and rasters from an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreDataCube {
    store: Arc<dyn ObjectStore>,
    root: String,
}

impl std::fmt::Debug for ObjectStoreDataCube {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreDataCube")
            .field("root", &self.root)
            .finish()
    }
}

impl ObjectStoreDataCube {
    pub fn new(store: Arc<dyn ObjectStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: root.into().trim_matches('/').to_string(),
        }
    }

    /// Open an index from a URL:
    /// - `memory://` an empty in-memory index
    /// - `s3://bucket/prefix` S3, credentials and endpoint from the `AWS_*` environment
    /// - `file:///path` or a bare path on local disk
    pub fn from_url(url: &str) -> CubeResult<Self> {
        if url.starts_with("memory://") {
            return Ok(Self::new(Arc::new(InMemory::new()), ""));
        }

        if let Some(rest) = url.strip_prefix("s3://") {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            let store = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .build()?;
            return Ok(Self::new(Arc::new(store), prefix));
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        let store = LocalFileSystem::new_with_prefix(path)?;
        Ok(Self::new(Arc::new(store), ""))
    }

    fn key(&self, relative: &str) -> Path {
        if self.root.is_empty() {
            Path::from(relative)
        } else {
            Path::from(format!("{}/{}", self.root, relative))
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, relative: &str) -> CubeResult<Option<T>> {
        match self.store.get(&self.key(relative)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_json<T: serde::Serialize>(&self, relative: &str, value: &T) -> CubeResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.store.put(&self.key(relative), bytes.into()).await?;
        Ok(())
    }

    async fn datasets_of(&self, product: &str) -> CubeResult<Vec<Dataset>> {
        Ok(self
            .get_json(&format!("datasets/{}.json", product))
            .await?
            .unwrap_or_default())
    }

    /// Write (or replace) a product definition.
    pub async fn put_product(&self, product: &Product) -> CubeResult<()> {
        self.put_json(&format!("products/{}.json", product.name), product)
            .await
    }

    /// Store a dataset's rasters and append it to its product's dataset list.
    /// Rasters are encoded in each measurement's storage type.
    pub async fn put_dataset(
        &self,
        mut dataset: Dataset,
        rasters: &[(String, Array2<f32>)],
    ) -> CubeResult<Dataset> {
        let product = self.product(&dataset.product).await?;

        for (band, raster) in rasters {
            let measurement = product.measurement(band).ok_or_else(|| {
                CubeError::MeasurementNotFound {
                    product: product.name.clone(),
                    measurement: band.clone(),
                }
            })?;
            if raster.dim() != dataset.grid.shape() {
                return Err(CubeError::ShapeMismatch(format!(
                    "raster for {} is {:?}, dataset grid is {:?}",
                    band,
                    raster.dim(),
                    dataset.grid.shape()
                )));
            }
            let relative = format!("bands/{}/{}.raw", dataset.id, measurement.name);
            let blob = codec::encode_raster(raster.view(), measurement.dtype);
            self.store.put(&self.key(&relative), blob.into()).await?;
            dataset.bands.insert(measurement.name.clone(), relative);
        }

        let mut datasets = self.datasets_of(&dataset.product).await?;
        datasets.retain(|d| d.id != dataset.id);
        datasets.push(dataset.clone());
        self.put_json(&format!("datasets/{}.json", dataset.product), &datasets)
            .await?;
        Ok(dataset)
    }
}

#[async_trait]
impl DataCube for ObjectStoreDataCube {
    async fn product(&self, name: &str) -> CubeResult<Product> {
        self.get_json(&format!("products/{}.json", name))
            .await?
            .ok_or_else(|| CubeError::ProductNotFound(name.to_string()))
    }

    #[instrument(skip(self, query), fields(product = %query.product))]
    async fn find_datasets(&self, query: &SpatioTemporalQuery) -> CubeResult<Vec<Dataset>> {
        let mut found = Vec::new();
        for dataset in self.datasets_of(&query.product).await? {
            if dataset_matches(&dataset, query)? {
                found.push(dataset);
            }
        }
        found.sort_by_key(|d| d.time);
        debug!(count = found.len(), "Found datasets");
        Ok(found)
    }

    async fn read_band(
        &self,
        dataset: &Dataset,
        measurement: &Measurement,
    ) -> CubeResult<Array2<f32>> {
        let relative = dataset.bands.get(&measurement.name).ok_or_else(|| {
            CubeError::read_failed(dataset.id, &measurement.name, "band not in dataset")
        })?;

        let bytes = self
            .store
            .get(&self.key(relative))
            .await
            .map_err(|e| CubeError::read_failed(dataset.id, &measurement.name, e.to_string()))?
            .bytes()
            .await
            .map_err(|e| CubeError::read_failed(dataset.id, &measurement.name, e.to_string()))?;

        codec::decode_raster(&bytes, measurement.dtype, dataset.grid.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::QueryGeometry;
    use crate::types::DType;
    use chrono::{TimeZone, Utc};
    use drill_common::{Affine, CrsCode, GeoBox};
    use ndarray::array;

    fn product() -> Product {
        Product {
            name: "ls8_fc_albers".into(),
            description: "Fractional cover".into(),
            measurements: vec![
                Measurement::new("BS", DType::Int8, Some(-1.0)),
                Measurement::new("PV", DType::Int8, Some(-1.0)),
            ],
            grid_spec: None,
        }
    }

    #[tokio::test]
    async fn test_roundtrip_through_index() {
        let cube = ObjectStoreDataCube::new(Arc::new(InMemory::new()), "index");
        cube.put_product(&product()).await.unwrap();

        let grid = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 50.0, 25.0, -25.0), 2, 2);
        let dataset = Dataset::new(
            "ls8_fc_albers",
            Utc.with_ymd_and_hms(2018, 6, 1, 0, 0, 0).unwrap(),
            grid,
        );
        let bs = array![[10.0_f32, 20.0], [-1.0, 90.0]];
        let stored = cube
            .put_dataset(dataset, &[("BS".to_string(), bs.clone())])
            .await
            .unwrap();
        assert!(stored.bands["BS"].starts_with("bands/"));

        let query = SpatioTemporalQuery::new(
            "ls8_fc_albers",
            QueryGeometry::point(10.0, 10.0, CrsCode::Epsg3577),
        );
        let found = cube.find_datasets(&query).await.unwrap();
        assert_eq!(found.len(), 1);

        let product = cube.product("ls8_fc_albers").await.unwrap();
        let raster = cube.read_band(&found[0], &product.measurements[0]).await.unwrap();
        assert_eq!(raster, bs);

        // PV was never written
        let err = cube
            .read_band(&found[0], &product.measurements[1])
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_index_documents() {
        let cube = ObjectStoreDataCube::from_url("memory://").unwrap();
        assert!(matches!(
            cube.product("nothing").await,
            Err(CubeError::ProductNotFound(_))
        ));

        let query = SpatioTemporalQuery::new(
            "nothing",
            QueryGeometry::point(0.0, 0.0, CrsCode::Epsg4326),
        );
        assert!(cube.find_datasets(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_filesystem_index() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let cube = ObjectStoreDataCube::from_url(&url).unwrap();
        cube.put_product(&product()).await.unwrap();
        assert_eq!(cube.product("ls8_fc_albers").await.unwrap(), product());
    }
}
