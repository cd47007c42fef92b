//! Common test utilities for integration tests
//!
//! Builds the real router on top of the in-memory backends, so tests can
//! drive HTTP requests and then look straight into the stores.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use solfa_api::{
    app::{build_router, AppState, Backends},
    config::Config,
};
use solfa_shared::{
    auth::{
        jwt::{create_token, Claims},
        password::hash_password,
    },
    models::{
        memory::{MemoryPartitionStore, MemoryUserStore},
        user::{CreateUser, User, UserStore},
    },
    notify::{MemoryNotifier, SentMessage},
    search::memory::MemorySearchIndex,
    storage::memory::MemoryObjectStore,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower::Service as _;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PARTITION_INDEX: &str = "partitions";
pub const AUDIT_INDEX: &str = "user_actions";
pub const BOUNDARY: &str = "solfa-test-boundary";

/// Test context holding the router and handles on every backend
pub struct TestContext {
    pub app: Router,
    pub config: Config,
    pub users: Arc<MemoryUserStore>,
    pub partitions: Arc<MemoryPartitionStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub index: Arc<MemorySearchIndex>,
    pub notifier: Arc<MemoryNotifier>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Like `new`, with extra or overriding environment variables
    pub fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let mut vars = HashMap::from([
            ("DATABASE_URL", "postgresql://unused"),
            ("JWT_SECRET", JWT_SECRET),
            ("ES_HOST", "http://unused:9200"),
            ("MINIO_ENDPOINT", "unused:9000"),
            ("MINIO_ACCESS_KEY", "minio"),
            ("MINIO_SECRET_KEY", "minio123"),
            ("VERIFY_URL_BASE", "http://solfa.test/verify"),
        ]);
        vars.extend(overrides.iter().copied());
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .expect("test configuration should load");

        let users = Arc::new(MemoryUserStore::new());
        let partitions = Arc::new(MemoryPartitionStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(MemorySearchIndex::new());
        let notifier = Arc::new(MemoryNotifier::new());

        let state = AppState::new(
            config.clone(),
            Backends {
                users: users.clone(),
                partitions: partitions.clone(),
                objects: objects.clone(),
                index: index.clone(),
                notifier: notifier.clone(),
            },
        );

        Self {
            app: build_router(state),
            config,
            users,
            partitions,
            objects,
            index,
            notifier,
        }
    }

    /// Sends a request through the router, returning status and JSON body
    ///
    /// Bodies that aren't JSON come back as `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let mut app = self.app.clone();
        let response = app.call(request).await.expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, token, Body::empty(), None))
            .await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, token, &body)).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::PUT, uri, token, &body)).await
    }

    /// Inserts a verified user directly into the store
    pub async fn create_user(&self, username: &str, email: &str, password: &str) -> User {
        self.users
            .create(CreateUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password).expect("hashing should succeed"),
                email_verified: true,
                verification_token: None,
            })
            .await
            .expect("user should be created")
    }

    /// Session token for `user`
    pub fn token_for(&self, user: &User) -> String {
        let claims = Claims::new(user.username.clone(), user.email.clone());
        create_token(&claims, JWT_SECRET).expect("token should be created")
    }

    /// Waits for the spawned verification mail to be recorded
    pub async fn wait_for_mail(&self, count: usize) -> Vec<SentMessage> {
        for _ in 0..100 {
            let sent = self.notifier.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.sent()
    }

    /// Audit actions recorded so far, in order
    pub fn audit_actions(&self) -> Vec<String> {
        self.index
            .documents(AUDIT_INDEX)
            .iter()
            .filter_map(|doc| doc["action"].as_str().map(str::to_string))
            .collect()
    }
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Body,
    content_type: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).expect("request should build")
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    request(
        method,
        uri,
        token,
        Body::from(body.to_string()),
        Some("application/json"),
    )
}

/// Multipart form for `/upload`
pub struct UploadForm {
    fields: Vec<(String, String)>,
    file: Option<(String, Vec<u8>)>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            file: None,
        }
    }

    /// A complete form for a partition
    pub fn partition(title: &str, composer: &str, genre: &str, category: &str) -> Self {
        Self::new()
            .field("title", title)
            .field("composer", composer)
            .field("genre", genre)
            .field("category", category)
            .file("score.pdf", b"%PDF-1.4 test score")
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn file(mut self, file_name: &str, contents: &[u8]) -> Self {
        self.file = Some((file_name.to_string(), contents.to_vec()));
        self
    }

    pub fn without_file(mut self) -> Self {
        self.file = None;
        self
    }

    pub fn into_body(self) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in &self.fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        if let Some((file_name, contents)) = &self.file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"partition_file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn into_request(self, token: Option<&str>) -> Request<Body> {
        request(
            Method::POST,
            "/upload",
            token,
            Body::from(self.into_body()),
            Some(&format!("multipart/form-data; boundary={}", BOUNDARY)),
        )
    }
}
