//! Index backends
//!
//! Documents live in one flat key space. An index is a schema plus a key
//! prefix over that key space: dropping an index leaves its documents in
//! place, and re-creating it indexes whatever matches the prefix again.

pub mod cursor;
pub mod evaluator;
pub mod factory;
pub mod memory;
pub mod redis;
pub mod sled;

pub use factory::{create_backend, create_memory_backend};
pub use memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use self::sled::SledBackend;

use crate::error::{ClientError, Result};
use crate::query::SearchQuery;
use crate::schema::FieldDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored document: indexed field values plus the entity payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full document key, including the index prefix
    pub key: String,

    /// Indexed field values by field name
    pub fields: BTreeMap<String, String>,

    /// Encoded entity; absent when content was not requested
    pub payload: Option<Vec<u8>>,
}

impl Document {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Index schema as handed to the backend at create time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,

    /// Documents whose key starts with this prefix belong to the index
    pub prefix: String,

    pub fields: Vec<FieldDefinition>,
}

impl IndexDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Result of a single bounded query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Total matches reported by the backend, independent of the window
    pub total: u64,
    pub documents: Vec<Document>,
}

/// One batch read through a server-side cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorBatch {
    pub total: u64,
    pub documents: Vec<Document>,

    /// Handle for the next read; `None` once the backend has closed the cursor
    pub cursor: Option<u64>,
}

/// Operations the client needs from an index engine.
///
/// Implementations own their connection handling and must be safe to share
/// between threads.
pub trait IndexBackend: Send + Sync {
    /// Short backend name, used in logs
    fn name(&self) -> &'static str;

    fn create_index(&self, definition: &IndexDefinition) -> Result<()>;

    /// Drop an index definition; `false` when it did not exist
    fn drop_index(&self, name: &str) -> Result<bool>;

    fn index_exists(&self, name: &str) -> Result<bool>;

    /// Replace the whole document stored under `document.key`
    fn write_document(&self, index: &str, document: &Document) -> Result<()>;

    fn read_document(&self, key: &str) -> Result<Option<Document>>;

    /// Remove a document; `false` when the key did not exist
    fn delete_document(&self, key: &str) -> Result<bool>;

    fn search(&self, index: &str, query: &SearchQuery) -> Result<QueryResult>;

    fn supports_cursors(&self) -> bool {
        false
    }

    /// Start a cursor over the query's matches and read the first batch
    fn cursor_query(
        &self,
        index: &str,
        _query: &SearchQuery,
        _batch_size: usize,
    ) -> Result<CursorBatch> {
        Err(ClientError::Unsupported(format!(
            "{} backend has no cursor support (index {})",
            self.name(),
            index
        )))
    }

    fn cursor_read(&self, index: &str, _cursor: u64, _batch_size: usize) -> Result<CursorBatch> {
        Err(ClientError::Unsupported(format!(
            "{} backend has no cursor support (index {})",
            self.name(),
            index
        )))
    }

    fn cursor_close(&self, index: &str, _cursor: u64) -> Result<()> {
        Err(ClientError::Unsupported(format!(
            "{} backend has no cursor support (index {})",
            self.name(),
            index
        )))
    }
}
