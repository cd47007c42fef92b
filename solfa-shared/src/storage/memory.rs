/// In-memory object store for tests

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ObjectStore, StorageError, StoredObject};

#[derive(Debug, Clone)]
struct StoredBlob {
    body: Bytes,
    content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Content type recorded for `key`, if present
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|blob| blob.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let size = body.len();
        self.objects.write().unwrap_or_else(|e| e.into_inner()).insert(
            key.to_string(),
            StoredBlob {
                body,
                content_type: content_type.to_string(),
            },
        );

        Ok(StoredObject {
            key: key.to_string(),
            size,
        })
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|blob| blob.body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryObjectStore::new();
        let stored = store
            .put_object("partitions/a.pdf", Bytes::from_static(b"abc"), "application/pdf")
            .await
            .unwrap();

        assert_eq!(stored.size, 3);
        assert!(store.contains("partitions/a.pdf"));
        assert_eq!(
            store.content_type("partitions/a.pdf").as_deref(),
            Some("application/pdf")
        );
        assert_eq!(
            store.get_object("partitions/a.pdf").await.unwrap(),
            Bytes::from_static(b"abc")
        );
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get_object("nope").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
