//! Metadata store contract
//!
//! Entity records are opaque JSON documents addressed by collection name and id. The media
//! subsystem only needs create / find / update / delete plus listing; richer queries belong
//! to the services that own those entities.

use async_trait::async_trait;
use classhub_core::AppError;
use serde_json::Value;
use uuid::Uuid;

/// Top-level body field holding a record's revision. Records without it are at revision 0.
pub const VERSION_FIELD: &str = "version";

/// Result of a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No record with that id
    Missing,
    /// The stored revision no longer matches the expected one
    Stale,
}

/// Revision stored in a record body
pub fn body_version(body: &Value) -> u64 {
    body.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0)
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create(&self, collection: &str, id: Uuid, body: Value) -> Result<(), AppError>;

    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Value>, AppError>;

    /// Replace the body of an existing record, but only while its stored revision is still
    /// `expected_version`.
    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        body: Value,
    ) -> Result<UpdateOutcome, AppError>;

    /// Returns `false` if no record matched.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, AppError>;

    /// Every record of a collection, newest first
    async fn list(&self, collection: &str) -> Result<Vec<Value>, AppError>;

    /// Records whose top-level string `field` equals `value`, newest first
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError>;

    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> Result<(), AppError>;
}
