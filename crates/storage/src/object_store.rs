//! Artifact upload to object storage (MinIO/S3 compatible).

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, memory::InMemory, path::Path, Attribute, AttributeValue, Attributes,
    ObjectStore, PutOptions, PutPayload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use drill_common::{DrillError, DrillResult};

/// Uploads request artifacts and hands back a URL clients can fetch.
///
/// Keys are unique per request, so repeated uploads of the same key simply
/// overwrite.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> DrillResult<String>;
}

/// Configuration for the artifact bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStoreConfig {
    /// S3/MinIO endpoint URL; `None` means AWS proper.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    /// Base URL that uploaded keys are published under.
    pub public_url: Option<String>,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "dea-wps-results".to_string(),
            access_key_id: None,
            secret_access_key: None,
            region: "ap-southeast-2".to_string(),
            public_url: None,
            allow_http: false,
        }
    }
}

impl ArtifactStoreConfig {
    /// Read `S3_ENDPOINT`, `S3_BUCKET`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`,
    /// `S3_REGION` and `S3_PUBLIC_URL`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let defaults = Self::default();
        let endpoint = var("S3_ENDPOINT");
        Self {
            allow_http: endpoint.as_deref().is_some_and(|e| e.starts_with("http://")),
            endpoint,
            bucket: var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: var("S3_ACCESS_KEY"),
            secret_access_key: var("S3_SECRET_KEY"),
            region: var("S3_REGION").unwrap_or(defaults.region),
            public_url: var("S3_PUBLIC_URL"),
        }
    }

    /// Base URL for public links: the configured public URL, else
    /// path-style on the custom endpoint, else virtual-hosted AWS.
    pub fn public_base(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// [`ArtifactStore`] over any `object_store` backend.
pub struct ObjectArtifactStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    public_base: String,
}

impl ObjectArtifactStore {
    /// Connect to the configured S3 bucket.
    pub fn new(config: &ArtifactStoreConfig) -> DrillResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| DrillError::Storage(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::with_store(
            Arc::new(store),
            config.bucket.clone(),
            config.public_base(),
        ))
    }

    /// In-process store, for tests and local runs without a bucket.
    pub fn in_memory(public_base: impl Into<String>) -> Self {
        Self::with_store(Arc::new(InMemory::new()), "memory".to_string(), public_base.into())
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: String, public_base: String) -> Self {
        Self {
            store,
            bucket,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key.trim_start_matches('/'))
    }

    /// Read an uploaded artifact back with its content type.
    pub async fn get(&self, key: &str) -> DrillResult<(Bytes, Option<String>)> {
        let location = Path::from(key);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| DrillError::Storage(format!("Failed to read {}: {}", key, e)))?;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string());
        let bytes = result
            .bytes()
            .await
            .map_err(|e| DrillError::Storage(format!("Failed to read bytes: {}", e)))?;
        Ok((bytes, content_type))
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> DrillResult<bool> {
        match self.store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(DrillError::Storage(format!("Failed to check {}: {}", key, e))),
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectArtifactStore {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key))]
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> DrillResult<String> {
        let location = Path::from(key);
        let size = data.len();

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| DrillError::Storage(format!("Failed to write {}: {}", key, e)))?;

        metrics::counter!("artifact_uploads_total").increment(1);
        let url = self.public_url(key);
        debug!(size, content_type, "Wrote artifact");
        info!(url = %url, "artifact uploaded");
        Ok(url)
    }
}

/// Key layout for request artifacts.
pub struct StoragePath;

impl StoragePath {
    /// Format: {process_id}/{file_name}
    pub fn artifact(process_id: &str, file_name: &str) -> String {
        format!("{}/{}", process_id, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_base() {
        let config = ArtifactStoreConfig::default();
        assert_eq!(
            config.public_base(),
            "https://dea-wps-results.s3.ap-southeast-2.amazonaws.com"
        );

        let minio = ArtifactStoreConfig {
            endpoint: Some("http://localhost:9000/".to_string()),
            bucket: "charts".to_string(),
            ..Default::default()
        };
        assert_eq!(minio.public_base(), "http://localhost:9000/charts");

        let public = ArtifactStoreConfig {
            public_url: Some("https://cdn.example.org/wps/".to_string()),
            ..minio
        };
        assert_eq!(public.public_base(), "https://cdn.example.org/wps");
    }

    #[test]
    fn test_artifact_path() {
        assert_eq!(StoragePath::artifact("abc-123", "chart.html"), "abc-123/chart.html");
    }

    #[tokio::test]
    async fn test_upload_sets_content_type() {
        let store = ObjectArtifactStore::in_memory("http://localhost:9000/results/");
        let url = store
            .upload("job-1/chart.html", Bytes::from_static(b"<html></html>"), "text/html")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:9000/results/job-1/chart.html");

        let (bytes, content_type) = store.get("job-1/chart.html").await.unwrap();
        assert_eq!(&bytes[..], b"<html></html>");
        assert_eq!(content_type.as_deref(), Some("text/html"));
        assert!(store.exists("job-1/chart.html").await.unwrap());
        assert!(!store.exists("job-1/chart.png").await.unwrap());
    }
}
