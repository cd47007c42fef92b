/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Liveness and health check endpoints
/// - `auth`: Account endpoints (signup, verify, login, logout)
/// - `users`: Profile endpoints
/// - `partitions`: Upload, validation and search

pub mod auth;
pub mod health;
pub mod partitions;
pub mod users;
