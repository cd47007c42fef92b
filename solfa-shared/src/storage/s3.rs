/// S3-compatible object store client
///
/// Talks to MinIO (or any S3 implementation) with path-style URLs:
/// `{endpoint}/{bucket}/{key}`. Every request is signed with SigV4 over the
/// full request path, including any prefix the endpoint carries (for a
/// store behind a reverse proxy).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Method, StatusCode, Url};
use tracing::{debug, info};

use super::sigv4::{self, Credentials};
use super::{ObjectStore, StorageError, StoredObject};

/// Connection settings for the object store
#[derive(Debug, Clone)]
pub struct S3Config {
    /// `host[:port]` or a full URL
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,

    /// Use https when `endpoint` carries no scheme
    pub secure: bool,
}

impl S3Config {
    fn base_url(&self) -> Result<Url, StorageError> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(StorageError::InvalidConfig("endpoint is empty".to_string()));
        }

        let with_scheme = if endpoint.contains("://") {
            endpoint.to_string()
        } else if self.secure {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        };

        Url::parse(&with_scheme)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid endpoint: {}", e)))
    }
}

/// Object store backed by an S3 bucket
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    /// `scheme://host[:port]`
    origin: String,
    /// Endpoint path without trailing slash, empty for the root
    prefix: String,
    host: String,
    bucket: String,
    credentials: Credentials,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> Result<Self, StorageError> {
        let base = config.base_url()?;

        let host = match (base.host_str(), base.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(StorageError::InvalidConfig(
                    "endpoint has no host".to_string(),
                ))
            }
        };

        if config.bucket.is_empty() {
            return Err(StorageError::InvalidConfig("bucket is empty".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            origin: format!("{}://{}", base.scheme(), host),
            prefix: base.path().trim_end_matches('/').to_string(),
            host,
            bucket: config.bucket,
            credentials: Credentials {
                access_key: config.access_key,
                secret_key: config.secret_key,
                region: config.region,
            },
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Request path of the bucket, exactly as sent and signed
    fn bucket_path(&self) -> String {
        format!("{}/{}", self.prefix, sigv4::uri_encode(&self.bucket, true))
    }

    fn object_path(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.bucket_path(),
            sigv4::uri_encode(key.trim_start_matches('/'), false)
        )
    }

    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let payload_hash = sigv4::hash_payload(&body);
        let signed = sigv4::sign(
            method.as_str(),
            &self.host,
            path,
            &payload_hash,
            &self.credentials,
            Utc::now(),
        )?;

        let mut request = self
            .client
            .request(method, self.url(path))
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .header(reqwest::header::AUTHORIZATION, signed.authorization);

        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    /// Creates the bucket if it doesn't exist yet
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let path = self.bucket_path();

        let response = self
            .send_signed(Method::HEAD, &path, Bytes::new(), None)
            .await?;
        if response.status().is_success() {
            debug!(bucket = %self.bucket, "Bucket exists");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(rejected(response).await);
        }

        let response = self
            .send_signed(Method::PUT, &path, Bytes::new(), None)
            .await?;
        // 409 means another process created it first
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            info!(bucket = %self.bucket, "Created bucket");
            return Ok(());
        }

        Err(rejected(response).await)
    }
}

async fn rejected(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Rejected { status, body }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let size = body.len();
        let path = self.object_path(key);

        let response = self
            .send_signed(Method::PUT, &path, body, Some(content_type))
            .await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        debug!(key, size, "Stored object");
        Ok(StoredObject {
            key: key.to_string(),
            size,
        })
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key);

        let response = self
            .send_signed(Method::GET, &path, Bytes::new(), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        Ok(response.bytes().await?)
    }
}
