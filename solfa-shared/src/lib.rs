//! # Solfa Shared Library
//!
//! This crate contains the domain types, stores, external service clients and
//! the partition workflow used by the Solfa API server.
//!
//! ## Module Organization
//!
//! - `auth`: Session tokens, password hashing and request authentication
//! - `db`: PostgreSQL pool and migrations
//! - `models`: Users and partitions, with their store traits
//! - `storage`: Object store gateway (S3/MinIO)
//! - `search`: Search index client (Elasticsearch)
//! - `partitions`: Upload / duplicate-check / validate workflow
//! - `audit`: Append-only audit trail of user actions
//! - `notify`: Out-of-band notifications (verification emails)

pub mod audit;
pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod partitions;
pub mod search;
pub mod storage;

/// Current version of the Solfa shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
