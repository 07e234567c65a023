//! Record controllers: generic per-collection data access over flat JSON documents.

pub mod memory;
pub mod pg;

use crate::error::ControllerError;
use crate::query::{Projection, RecordFilter, SortCondition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub use memory::MemoryRecordController;
pub use pg::{connect, ensure_collection_tables, ensure_database_exists, PgRecordController};

/// A stored document: a flat JSON object carrying at least `id`.
pub type Document = Map<String, Value>;

/// Fields managed by the store; clients cannot set them through a patch.
pub const MANAGED_FIELDS: &[&str] = &["id", "isDeleted", "timeStamp", "createdOn", "updatedOn"];

/// Result of a read: documents, or their number when a count was requested.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome {
    Documents(Vec<Document>),
    Count(u64),
}

impl ReadOutcome {
    pub fn into_payload(self) -> Value {
        match self {
            ReadOutcome::Documents(docs) => Value::Array(docs.into_iter().map(Value::Object).collect()),
            ReadOutcome::Count(n) => json!({ "count": n }),
        }
    }
}

/// Acknowledgement of an update or delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WriteAck {
    pub ok: bool,
    #[serde(rename = "nModified")]
    pub n_modified: u64,
}

impl WriteAck {
    pub fn modified(n_modified: u64) -> Self {
        WriteAck { ok: true, n_modified }
    }
}

#[async_trait]
pub trait RecordController: Send + Sync {
    /// Collection this controller serves.
    fn collection(&self) -> &str;

    /// Store `doc` under a freshly assigned id; returns the stored document.
    async fn create_record(&self, doc: Document) -> Result<Document, ControllerError>;

    async fn read_records(
        &self,
        filter: &RecordFilter,
        projection: &Projection,
        sort: Option<&SortCondition>,
        is_count: bool,
        skip: u64,
        limit: u64,
    ) -> Result<ReadOutcome, ControllerError>;

    async fn update_records(&self, filter: &RecordFilter, patch: Document) -> Result<WriteAck, ControllerError>;

    /// Soft delete every matching live document.
    async fn delete_records(&self, filter: &RecordFilter) -> Result<WriteAck, ControllerError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), ControllerError>;
}

/// Stamp a new document with its id and lifecycle fields.
pub fn stamp_new(mut doc: Document, id: u64, now: DateTime<Utc>) -> Document {
    let ts = now.to_rfc3339();
    doc.insert("id".into(), Value::String(id.to_string()));
    doc.insert("isActive".into(), Value::Bool(true));
    doc.insert("isDeleted".into(), Value::Bool(false));
    doc.insert("timeStamp".into(), json!(now.timestamp_millis()));
    doc.insert("createdOn".into(), Value::String(ts.clone()));
    doc.insert("updatedOn".into(), Value::String(ts));
    doc
}

/// Drop store-managed fields from a client patch.
pub fn sanitize_patch(mut patch: Document) -> Document {
    for field in MANAGED_FIELDS {
        patch.remove(*field);
    }
    patch
}
