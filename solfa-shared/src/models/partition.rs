/// Partition model and database operations
///
/// A partition is one uploaded sheet-music file plus its descriptive
/// metadata. Every partition starts in `staging` and moves to `validated`
/// once a reviewer approves it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE partitions (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(512) NOT NULL,
///     composer VARCHAR(255) NOT NULL DEFAULT '',
///     genre VARCHAR(255) NOT NULL DEFAULT '',
///     category VARCHAR(255) NOT NULL DEFAULT '',
///     release_date DATE,
///     path VARCHAR(1024) NOT NULL,
///     status VARCHAR(16) NOT NULL DEFAULT 'staging'
///         CHECK (status IN ('staging', 'validated')),
///     validated_by VARCHAR(255) NOT NULL DEFAULT '',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::StoreError;

/// Longest title the `partitions.title` column accepts, in characters
pub const MAX_TITLE_LENGTH: usize = 512;

/// Longest composer, genre or category value, in characters
pub const MAX_METADATA_LENGTH: usize = 255;

const PARTITION_COLUMNS: &str = "id, title, composer, genre, category, release_date, path, \
                                 status, validated_by, created_at, updated_at";

/// Lifecycle state of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStatus {
    /// Uploaded, awaiting review
    Staging,
    /// Approved by a reviewer
    Validated,
}

impl PartitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStatus::Staging => "staging",
            PartitionStatus::Validated => "validated",
        }
    }

    /// Whether moving from `self` to `target` changes the lifecycle state
    ///
    /// The only transition is `staging -> validated`. Re-validating an
    /// already validated partition keeps its status and only replaces the
    /// validator.
    pub fn can_transition_to(&self, target: PartitionStatus) -> bool {
        matches!(
            (self, target),
            (PartitionStatus::Staging, PartitionStatus::Validated)
        )
    }
}

impl std::fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PartitionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "staging" => Ok(PartitionStatus::Staging),
            "validated" => Ok(PartitionStatus::Validated),
            other => Err(format!("unknown partition status: {}", other)),
        }
    }
}

/// Partition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Partition {
    pub id: i64,
    pub title: String,
    pub composer: String,
    pub genre: String,
    pub category: String,

    /// Release date, if one was supplied at upload
    pub release_date: Option<NaiveDate>,

    /// Object-storage location of the uploaded file
    pub path: String,

    #[sqlx(try_from = "String")]
    pub status: PartitionStatus,

    /// Email of the last validator, empty while in staging
    pub validated_by: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a new partition
///
/// New partitions are always inserted in `staging` with no validator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePartition {
    pub title: String,
    pub composer: String,
    pub genre: String,
    pub category: String,
    pub release_date: Option<NaiveDate>,
    pub path: String,
}

/// Partition metadata store
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Inserts a partition in `staging`
    async fn create(&self, data: CreatePartition) -> Result<Partition, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Partition>, StoreError>;

    /// Sets status to `validated` and records `validator`
    ///
    /// Returns None if the partition doesn't exist.
    async fn mark_validated(
        &self,
        id: i64,
        validator: &str,
    ) -> Result<Option<Partition>, StoreError>;
}

/// PostgreSQL-backed partition store
#[derive(Debug, Clone)]
pub struct PgPartitionStore {
    pool: PgPool,
}

impl PgPartitionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartitionStore for PgPartitionStore {
    async fn create(&self, data: CreatePartition) -> Result<Partition, StoreError> {
        let partition = sqlx::query_as::<_, Partition>(&format!(
            r#"
            INSERT INTO partitions (title, composer, genre, category, release_date, path, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PARTITION_COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.composer)
        .bind(data.genre)
        .bind(data.category)
        .bind(data.release_date)
        .bind(data.path)
        .bind(PartitionStatus::Staging.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(partition)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Partition>, StoreError> {
        let partition = sqlx::query_as::<_, Partition>(&format!(
            "SELECT {PARTITION_COLUMNS} FROM partitions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(partition)
    }

    async fn mark_validated(
        &self,
        id: i64,
        validator: &str,
    ) -> Result<Option<Partition>, StoreError> {
        let partition = sqlx::query_as::<_, Partition>(&format!(
            r#"
            UPDATE partitions
            SET status = $2,
                validated_by = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PARTITION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(PartitionStatus::Validated.as_str())
        .bind(validator)
        .fetch_optional(&self.pool)
        .await?;

        Ok(partition)
    }
}
