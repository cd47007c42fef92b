/// Object storage for uploaded partition files
///
/// Files are written to an S3-compatible bucket (MinIO in development) under
/// `partitions/{YYYYMMDDHHMMSS}_{basename}`. The key is what the partition
/// record stores as its `path`.
///
/// # Backends
///
/// - `s3`: Path-style S3 client over reqwest, signed with SigV4
/// - `memory`: In-process map for tests
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use chrono::Utc;
/// use solfa_shared::storage::{object_key, ObjectStore};
/// use solfa_shared::storage::memory::MemoryObjectStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryObjectStore::new();
/// let key = object_key("nocturne.pdf", Utc::now());
/// store
///     .put_object(&key, Bytes::from_static(b"%PDF-1.7"), "application/pdf")
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod s3;
pub mod sigv4;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix under which all partition files are stored
pub const PARTITION_PREFIX: &str = "partitions";

/// Object storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to sign storage request")]
    Signing,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
}

/// Blob storage seam
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` under `key`, overwriting any existing object
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Reads the object stored under `key`
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;
}

/// Builds the storage key for an uploaded file
///
/// Only the final path component of `filename` is kept, so client-supplied
/// directories can't escape the prefix. Two uploads of the same file name
/// within one second map to the same key.
pub fn object_key(filename: &str, now: DateTime<Utc>) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload");

    format!(
        "{}/{}_{}",
        PARTITION_PREFIX,
        now.format("%Y%m%d%H%M%S"),
        basename
    )
}
