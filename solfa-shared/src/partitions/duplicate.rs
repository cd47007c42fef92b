/// Duplicate detection strategies
///
/// Before an upload is accepted the partition index is searched for an
/// existing partition with the same metadata. Two strategies exist:
///
/// - `FuzzyFieldsDetector`: fuzzy multi_match of the title against all four
///   descriptive fields, every term required. This is the one uploads use.
/// - `ContentHashDetector`: exact match on `partition_hash`, the MD5 of the
///   concatenated fields. Cheaper, but misses near-duplicates.

use async_trait::async_trait;
use md5::{Digest, Md5};
use std::sync::Arc;

use crate::search::{MatchOperator, SearchError, SearchHit, SearchIndex, SearchQuery};

/// Index field holding `content_hash`
pub const PARTITION_HASH_FIELD: &str = "partition_hash";

/// Descriptive fields of a partition, as compared for duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionFingerprint {
    pub title: String,
    pub composer: String,
    pub genre: String,
    pub category: String,
}

/// MD5 hex digest of title, composer, genre and category, concatenated in
/// that order
pub fn content_hash(fingerprint: &PartitionFingerprint) -> String {
    let mut hasher = Md5::new();
    hasher.update(fingerprint.title.as_bytes());
    hasher.update(fingerprint.composer.as_bytes());
    hasher.update(fingerprint.genre.as_bytes());
    hasher.update(fingerprint.category.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
pub trait DuplicateDetector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the first indexed partition considered a duplicate
    async fn find_duplicate(
        &self,
        fingerprint: &PartitionFingerprint,
    ) -> Result<Option<SearchHit>, SearchError>;
}

pub struct FuzzyFieldsDetector {
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl FuzzyFieldsDetector {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>) -> Self {
        Self {
            index,
            index_name: index_name.into(),
        }
    }

    pub fn query(fingerprint: &PartitionFingerprint) -> SearchQuery {
        SearchQuery::partition_fields(fingerprint.title.clone(), MatchOperator::And)
    }
}

#[async_trait]
impl DuplicateDetector for FuzzyFieldsDetector {
    fn name(&self) -> &'static str {
        "fuzzy_fields"
    }

    async fn find_duplicate(
        &self,
        fingerprint: &PartitionFingerprint,
    ) -> Result<Option<SearchHit>, SearchError> {
        let hits = self
            .index
            .search(&self.index_name, &Self::query(fingerprint))
            .await?;
        Ok(hits.into_iter().next())
    }
}

pub struct ContentHashDetector {
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl ContentHashDetector {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>) -> Self {
        Self {
            index,
            index_name: index_name.into(),
        }
    }

    pub fn query(fingerprint: &PartitionFingerprint) -> SearchQuery {
        SearchQuery::Exact {
            field: PARTITION_HASH_FIELD.to_string(),
            value: content_hash(fingerprint),
        }
    }
}

#[async_trait]
impl DuplicateDetector for ContentHashDetector {
    fn name(&self) -> &'static str {
        "content_hash"
    }

    async fn find_duplicate(
        &self,
        fingerprint: &PartitionFingerprint,
    ) -> Result<Option<SearchHit>, SearchError> {
        let hits = self
            .index
            .search(&self.index_name, &Self::query(fingerprint))
            .await?;
        Ok(hits.into_iter().next())
    }
}
