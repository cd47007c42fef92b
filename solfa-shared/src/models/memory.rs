/// In-memory stores
///
/// Same contracts as the PostgreSQL stores, backed by a locked `Vec`. Used by
/// the router tests and for running the API without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

use super::partition::{CreatePartition, Partition, PartitionStatus, PartitionStore};
use super::user::{CreateUser, UpdateUser, User, UserStore};
use super::StoreError;

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());

        if users.iter().any(|u| u.email == data.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: users.len() as i64 + 1,
            username: data.username,
            email: data.email,
            password_hash: data.password_hash,
            email_verified: data.email_verified,
            verification_token: data.verification_token,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn verify_email(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());

        let Some(user) = users
            .iter_mut()
            .find(|u| u.verification_token.as_deref() == Some(token))
        else {
            return Ok(None);
        };

        user.email_verified = true;
        user.verification_token = None;
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn update(&self, id: i64, data: UpdateUser) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(username) = data.username {
            user.username = username;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }
}

/// In-memory partition store
#[derive(Debug, Default)]
pub struct MemoryPartitionStore {
    partitions: RwLock<Vec<Partition>>,
}

impl MemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored partitions
    pub fn len(&self) -> usize {
        self.partitions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    async fn create(&self, data: CreatePartition) -> Result<Partition, StoreError> {
        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now();
        let partition = Partition {
            id: partitions.len() as i64 + 1,
            title: data.title,
            composer: data.composer,
            genre: data.genre,
            category: data.category,
            release_date: data.release_date,
            path: data.path,
            status: PartitionStatus::Staging,
            validated_by: String::new(),
            created_at: now,
            updated_at: now,
        };
        partitions.push(partition.clone());

        Ok(partition)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Partition>, StoreError> {
        let partitions = self.partitions.read().unwrap_or_else(|e| e.into_inner());
        Ok(partitions.iter().find(|p| p.id == id).cloned())
    }

    async fn mark_validated(
        &self,
        id: i64,
        validator: &str,
    ) -> Result<Option<Partition>, StoreError> {
        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());

        let Some(partition) = partitions.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        partition.status = PartitionStatus::Validated;
        partition.validated_by = validator.to_string();
        partition.updated_at = Utc::now();

        Ok(Some(partition.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, token: Option<&str>) -> CreateUser {
        CreateUser {
            username: "clara".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            email_verified: false,
            verification_token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@example.com", None)).await.unwrap();

        let err = store.create(new_user("a@example.com", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let store = MemoryUserStore::new();
        store
            .create(new_user("a@example.com", Some("tok")))
            .await
            .unwrap();

        let verified = store.verify_email("tok").await.unwrap().unwrap();
        assert!(verified.email_verified);
        assert!(verified.verification_token.is_none());

        assert!(store.verify_email("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = MemoryUserStore::new();
        let result = store
            .update(
                42,
                UpdateUser {
                    username: Some("x".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_partition_lifecycle() {
        let store = MemoryPartitionStore::new();
        let created = store
            .create(CreatePartition {
                title: "Gymnopédie No.1".to_string(),
                path: "partitions/x.pdf".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.status, PartitionStatus::Staging);
        assert_eq!(created.validated_by, "");

        let validated = store
            .mark_validated(created.id, "reviewer@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validated.status, PartitionStatus::Validated);
        assert_eq!(validated.validated_by, "reviewer@example.com");

        assert!(store.mark_validated(99, "r@example.com").await.unwrap().is_none());
    }
}
