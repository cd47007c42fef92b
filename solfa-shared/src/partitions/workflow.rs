/// Partition upload, validation and search
///
/// The workflow coordinates three independent backends (object storage,
/// the partition store and the search index) without any distributed
/// transaction. Writes happen in a fixed order and a later failure never
/// rolls back an earlier write:
///
/// ```text
/// upload:   duplicate check -> date parse -> object put -> DB insert -> index -> audit
/// validate: DB lookup -> DB update -> index patch -> audit
/// ```
///
/// Index writes during upload are best effort. During validation an index
/// failure is reported to the caller, leaving the DB row updated.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::duplicate::{
    content_hash, DuplicateDetector, FuzzyFieldsDetector, PartitionFingerprint,
    PARTITION_HASH_FIELD,
};
use crate::audit::{AuditAction, AuditLog};
use crate::models::partition::{
    CreatePartition, Partition, PartitionStatus, PartitionStore, MAX_METADATA_LENGTH,
    MAX_TITLE_LENGTH,
};
use crate::models::StoreError;
use crate::search::{MatchOperator, SearchError, SearchHit, SearchIndex, SearchQuery};
use crate::storage::{object_key, ObjectStore, StorageError, StoredObject};

/// Default partition index name
pub const DEFAULT_PARTITION_INDEX: &str = "partitions";

const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Client input is unusable
    #[error("{0}")]
    InvalidInput(String),

    /// A similar partition is already indexed
    #[error("A similar partition already exists")]
    Duplicate { existing: SearchHit },

    #[error("Partition {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The search query itself failed
    #[error("Search failed: {0}")]
    Search(#[source] SearchError),

    /// The index could not be brought in line with the store
    #[error("Index update failed: {0}")]
    Index(#[source] SearchError),
}

/// A partition upload as received from the client
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub title: String,
    pub composer: String,
    pub genre: String,
    pub category: String,

    /// `YYYY-MM-DD`, empty or None for unknown
    pub release_date: Option<String>,

    pub file_name: String,
    pub content_type: Option<String>,
    pub file: Bytes,
}

impl UploadRequest {
    pub fn fingerprint(&self) -> PartitionFingerprint {
        PartitionFingerprint {
            title: self.title.clone(),
            composer: self.composer.clone(),
            genre: self.genre.clone(),
            category: self.category.clone(),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub partition: Partition,
    pub object: StoredObject,
}

/// Parses an optional `YYYY-MM-DD` date, treating empty input as absent
pub fn parse_release_date(value: Option<&str>) -> Result<Option<NaiveDate>, WorkflowError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, RELEASE_DATE_FORMAT)
            .map(Some)
            .map_err(|_| {
                WorkflowError::InvalidInput(
                    "Invalid release_date, expected YYYY-MM-DD".to_string(),
                )
            }),
    }
}

/// Rejects metadata the partitions table can't hold
fn check_metadata(request: &UploadRequest) -> Result<(), WorkflowError> {
    if request.title.trim().is_empty() {
        return Err(WorkflowError::InvalidInput("title is required".to_string()));
    }
    if request.title.chars().count() > MAX_TITLE_LENGTH {
        return Err(WorkflowError::InvalidInput(format!(
            "title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    for (field, value) in [
        ("composer", &request.composer),
        ("genre", &request.genre),
        ("category", &request.category),
    ] {
        if value.chars().count() > MAX_METADATA_LENGTH {
            return Err(WorkflowError::InvalidInput(format!(
                "{} must be at most {} characters",
                field, MAX_METADATA_LENGTH
            )));
        }
    }

    Ok(())
}

/// Search document for a partition: its JSON form plus `partition_hash`
pub fn index_document(partition: &Partition) -> Result<JsonValue, serde_json::Error> {
    let mut document = serde_json::to_value(partition)?;
    let fingerprint = PartitionFingerprint {
        title: partition.title.clone(),
        composer: partition.composer.clone(),
        genre: partition.genre.clone(),
        category: partition.category.clone(),
    };
    document[PARTITION_HASH_FIELD] = JsonValue::String(content_hash(&fingerprint));
    Ok(document)
}

/// Partition lifecycle coordinator
pub struct PartitionWorkflow {
    partitions: Arc<dyn PartitionStore>,
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn SearchIndex>,
    detector: Arc<dyn DuplicateDetector>,
    audit: AuditLog,
    index_name: String,
}

impl PartitionWorkflow {
    /// Creates a workflow using `FuzzyFieldsDetector` for duplicates
    pub fn new(
        partitions: Arc<dyn PartitionStore>,
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn SearchIndex>,
        audit: AuditLog,
        index_name: impl Into<String>,
    ) -> Self {
        let index_name = index_name.into();
        let detector = Arc::new(FuzzyFieldsDetector::new(index.clone(), index_name.clone()));

        Self {
            partitions,
            objects,
            index,
            detector,
            audit,
            index_name,
        }
    }

    /// Replaces the duplicate detection strategy
    pub fn with_detector(mut self, detector: Arc<dyn DuplicateDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Uploads a new partition in `staging`
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a missing or oversized field, or a malformed
    ///   release date
    /// - `Duplicate` if a similar partition is indexed (nothing is written)
    /// - `Storage` / `Store` if the file or the record can't be saved
    pub async fn upload(
        &self,
        request: UploadRequest,
        uploader: &str,
    ) -> Result<UploadOutcome, WorkflowError> {
        check_metadata(&request)?;

        let fingerprint = request.fingerprint();
        match self.detector.find_duplicate(&fingerprint).await {
            Ok(Some(existing)) => {
                info!(
                    title = %request.title,
                    existing_id = %existing.id,
                    detector = self.detector.name(),
                    "Rejected duplicate partition"
                );
                return Err(WorkflowError::Duplicate { existing });
            }
            Ok(None) => {}
            Err(e) => {
                // Duplicate detection is best effort
                warn!(
                    title = %request.title,
                    error = %e,
                    "Duplicate check failed, accepting upload"
                );
            }
        }

        let release_date = parse_release_date(request.release_date.as_deref())?;

        let key = object_key(&request.file_name, Utc::now());
        let content_type = request
            .content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let object = self
            .objects
            .put_object(&key, request.file, content_type)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to store partition file");
                e
            })?;

        let partition = self
            .partitions
            .create(CreatePartition {
                title: request.title,
                composer: request.composer,
                genre: request.genre,
                category: request.category,
                release_date,
                path: object.key.clone(),
            })
            .await?;

        info!(
            partition_id = partition.id,
            path = %partition.path,
            size = object.size,
            "Partition uploaded"
        );

        self.mirror(&partition).await;
        self.audit.record(AuditAction::UploadPartition, uploader).await;

        Ok(UploadOutcome { partition, object })
    }

    async fn mirror(&self, partition: &Partition) {
        let document = match index_document(partition) {
            Ok(document) => document,
            Err(e) => {
                error!(partition_id = partition.id, error = %e, "Failed to serialize partition");
                return;
            }
        };

        let id = partition.id.to_string();
        if let Err(e) = self
            .index
            .index_document(&self.index_name, Some(&id), &document)
            .await
        {
            error!(
                partition_id = partition.id,
                index = %self.index_name,
                error = %e,
                "Failed to index partition, search results will miss it"
            );
        }
    }

    /// Marks a partition validated by `validator`
    ///
    /// Validating an already validated partition is allowed and replaces
    /// `validated_by`.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `Index` if the DB was updated but the index patch failed
    pub async fn validate(&self, id: i64, validator: &str) -> Result<Partition, WorkflowError> {
        let current = self
            .partitions
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if !current.status.can_transition_to(PartitionStatus::Validated) {
            debug!(
                partition_id = id,
                previous_validator = %current.validated_by,
                "Re-validating partition"
            );
        }

        let partition = self
            .partitions
            .mark_validated(id, validator)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        let patch = json!({
            "status": partition.status,
            "validated_by": partition.validated_by,
            "updated_at": partition.updated_at,
        });

        if let Err(e) = self
            .index
            .update_document(&self.index_name, &id.to_string(), &patch)
            .await
        {
            warn!(
                partition_id = id,
                error = %e,
                "Partition validated in store but index update failed, store and index diverge"
            );
            return Err(WorkflowError::Index(e));
        }

        info!(partition_id = id, validator, "Partition validated");
        self.audit
            .record(AuditAction::ValidatePartition, validator)
            .await;

        Ok(partition)
    }

    /// Fuzzy search over title, composer, genre and category
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, WorkflowError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "query parameter 'q' is required".to_string(),
            ));
        }

        self.index
            .search(
                &self.index_name,
                &SearchQuery::partition_fields(query, MatchOperator::Or),
            )
            .await
            .map_err(WorkflowError::Search)
    }
}
