/// User action audit log
///
/// Every significant user action is appended to a dedicated search index
/// (`user_actions` by default) as `{action, email, timestamp}`. Entries are
/// never read back by the service.
///
/// Recording is best effort: a failed write is logged and swallowed, so an
/// unavailable search engine never fails the operation being audited.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::search::SearchIndex;

/// Default audit index name
pub const DEFAULT_AUDIT_INDEX: &str = "user_actions";

/// Audited user actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Signup,
    VerifyEmail,
    Login,
    Logout,
    UpdateProfile,
    UploadPartition,
    ValidatePartition,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "signup",
            AuditAction::VerifyEmail => "verify_email",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::UpdateProfile => "update_profile",
            AuditAction::UploadPartition => "upload_partition",
            AuditAction::ValidatePartition => "validate_partition",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub email: String,

    /// RFC 3339, second precision
    pub timestamp: String,
}

impl AuditEntry {
    pub fn new(action: AuditAction, email: impl Into<String>) -> Self {
        Self {
            action,
            email: email.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Append-only audit sink
#[derive(Clone)]
pub struct AuditLog {
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl AuditLog {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>) -> Self {
        Self {
            index,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Appends an entry, logging (not returning) any failure
    pub async fn record(&self, action: AuditAction, email: &str) {
        let entry = AuditEntry::new(action, email);

        let document = match serde_json::to_value(&entry) {
            Ok(document) => document,
            Err(e) => {
                error!(action = %action, error = %e, "Failed to serialize audit entry");
                return;
            }
        };

        match self
            .index
            .index_document(&self.index_name, None, &document)
            .await
        {
            Ok(id) => debug!(action = %action, email, id = %id, "Recorded audit entry"),
            Err(e) => error!(
                action = %action,
                email,
                error = %e,
                "Failed to record audit entry"
            ),
        }
    }
}
