/// Partition endpoints
///
/// - `POST /upload` - Multipart upload of a new partition (authenticated)
/// - `POST /validate` - Promote a partition from staging to validated (authenticated)
/// - `GET /search?q=` - Fuzzy search over the partition index

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query, State,
    },
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use solfa_shared::{
    auth::middleware::AuthContext,
    models::partition::Partition,
    partitions::UploadRequest,
    search::SearchHit,
};

/// Multipart field carrying the file
const FILE_FIELD: &str = "partition_file";

/// Upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,

    /// Object key the file was stored under
    pub file: String,

    pub partition: Partition,
}

/// Partition id as sent by clients, either `7` or `"7"`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PartitionId {
    Number(i64),
    Text(String),
}

impl PartitionId {
    fn parse(&self) -> Option<i64> {
        match self {
            PartitionId::Number(id) => Some(*id),
            PartitionId::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

/// Validation request
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub partition_id: PartitionId,
}

/// Validation response
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub message: String,
    pub partition: Partition,
}

/// Search query string
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Search response
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Upload a partition
///
/// # Endpoint
///
/// ```text
/// POST /upload
/// Authorization: Bearer <token>
/// Content-Type: multipart/form-data
///
/// title=Gymnopédie No.1
/// composer=Erik Satie
/// genre=Classical
/// category=Piano
/// release_date=1888-01-01
/// partition_file=@gymnopedie.pdf
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing title or file, oversized field, malformed
///   date or body
/// - `409 Conflict`: A similar partition exists, see `existing_partition`
/// - `413 Payload Too Large`: Body over `MAX_UPLOAD_BYTES`
/// - `500 Internal Server Error`: Object storage or database failure
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart?;
    let mut request = UploadRequest::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            request.file_name = field.file_name().unwrap_or_default().to_string();
            request.content_type = field.content_type().map(str::to_string);
            request.file = field.bytes().await?;
            has_file = true;
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => request.title = value,
            "composer" => request.composer = value,
            "genre" => request.genre = value,
            "category" => request.category = value,
            "release_date" => request.release_date = Some(value),
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    if !has_file {
        return Err(ApiError::BadRequest(format!(
            "Missing file field '{}'",
            FILE_FIELD
        )));
    }

    let outcome = state.partitions.upload(request, &auth.email).await?;

    Ok(Json(UploadResponse {
        message: "Partition uploaded".to_string(),
        file: outcome.object.key,
        partition: outcome.partition,
    }))
}

/// Validate a partition
///
/// # Endpoint
///
/// ```text
/// POST /validate
/// Authorization: Bearer <token>
/// Content-Type: application/json
///
/// { "partition_id": 7 }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body
/// - `404 Not Found`: Non-numeric or unknown id
/// - `500 Internal Server Error`: Store or index failure
pub async fn validate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> ApiResult<Json<ValidateResponse>> {
    let Json(req) = payload?;
    let id = req
        .partition_id
        .parse()
        .ok_or_else(|| ApiError::NotFound("Partition not found".to_string()))?;

    let partition = state.partitions.validate(id, &auth.email).await?;

    Ok(Json(ValidateResponse {
        message: "Partition validated".to_string(),
        partition,
    }))
}

/// Search partitions
///
/// # Endpoint
///
/// ```text
/// GET /search?q=satie
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Empty query
/// - `500 Internal Server Error`: Search backend failure
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Query(params) = params?;
    let results = state
        .partitions
        .search(params.q.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(SearchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_id_forms() {
        let number: ValidateRequest = serde_json::from_str(r#"{"partition_id": 7}"#).unwrap();
        assert_eq!(number.partition_id.parse(), Some(7));

        let text: ValidateRequest = serde_json::from_str(r#"{"partition_id": " 12 "}"#).unwrap();
        assert_eq!(text.partition_id.parse(), Some(12));

        let junk: ValidateRequest = serde_json::from_str(r#"{"partition_id": "abc"}"#).unwrap();
        assert_eq!(junk.partition_id.parse(), None);
    }
}
