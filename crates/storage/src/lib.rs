//! Storage for drill artifacts.
//!
//! Chart pages and images are written to an S3-compatible bucket under a
//! per-request prefix and linked from the process outputs by public URL.

pub mod object_store;

pub use self::object_store::{ArtifactStore, ArtifactStoreConfig, ObjectArtifactStore, StoragePath};
