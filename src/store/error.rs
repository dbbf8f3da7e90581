//! Store Errors
//!
//! Error types for document store operations.

use uuid::Uuid;

/// Errors that can occur in a document collection
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Document not found
    #[error("{collection} document not found: {id}")]
    NotFound { collection: &'static str, id: Uuid },

    /// Unique key already held by another document
    #[error("Unique key {key} already exists in {collection}")]
    UniqueViolation {
        collection: &'static str,
        key: String,
    },

    /// Optimistic concurrency conflict
    #[error("Version conflict on {collection} {id}: expected version {expected}, found {actual}")]
    VersionConflict {
        collection: &'static str,
        id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend cannot serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if this error is a unique key collision on `key`
    pub fn is_unique_violation_on(&self, key: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { key: k, .. } if k == key)
    }

    /// Check if this error is a concurrency conflict
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::Database(_) | StoreError::Unavailable(_)
        )
    }
}
