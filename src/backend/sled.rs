use super::cursor::CursorRegistry;
use super::{evaluator, CursorBatch, Document, IndexBackend, IndexDefinition, QueryResult};
use crate::error::{ClientError, Result};
use crate::query::SearchQuery;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent index backend using the Sled embedded database
#[derive(Clone)]
pub struct SledBackend {
    db: Arc<Db>,
    documents_tree: sled::Tree,
    indexes_tree: sled::Tree,
    cursors: Arc<CursorRegistry>,
}

impl SledBackend {
    /// Open (or create) a Sled database at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            ClientError::Backend(format!("Failed to open Sled database: {}", e))
        })?;

        let documents_tree = db.open_tree("documents").map_err(|e| {
            ClientError::Backend(format!("Failed to open documents tree: {}", e))
        })?;

        let indexes_tree = db.open_tree("indexes").map_err(|e| {
            ClientError::Backend(format!("Failed to open indexes tree: {}", e))
        })?;

        tracing::info!("Initialized Sled backend at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            documents_tree,
            indexes_tree,
            cursors: Arc::new(CursorRegistry::new()),
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn deserialize_document(bytes: &[u8]) -> Result<Document> {
        bincode::deserialize(bytes).map_err(|e| {
            ClientError::Backend(format!("Failed to deserialize stored document: {}", e))
        })
    }

    fn definition(&self, index: &str) -> Result<IndexDefinition> {
        let bytes = self
            .indexes_tree
            .get(index.as_bytes())?
            .ok_or_else(|| ClientError::UnknownIndex(index.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| {
            ClientError::Backend(format!("Failed to deserialize index definition: {}", e))
        })
    }

    fn evaluate(&self, index: &str, query: &SearchQuery) -> Result<(u64, Vec<Document>)> {
        let definition = self.definition(index)?;
        let mut candidates = Vec::new();
        for item in self.documents_tree.scan_prefix(definition.prefix.as_bytes()) {
            let (_, bytes) = item?;
            candidates.push(Self::deserialize_document(&bytes)?);
        }
        evaluator::execute(&definition, candidates, query)
    }
}

impl IndexBackend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        let bytes = bincode::serialize(definition)?;
        let previous = self.indexes_tree.compare_and_swap(
            definition.name.as_bytes(),
            None as Option<&[u8]>,
            Some(bytes),
        )?;
        if previous.is_err() {
            return Err(ClientError::Backend(format!(
                "Index already exists: {}",
                definition.name
            )));
        }
        tracing::debug!(index = %definition.name, prefix = %definition.prefix, "Index created");
        Ok(())
    }

    fn drop_index(&self, name: &str) -> Result<bool> {
        let dropped = self.indexes_tree.remove(name.as_bytes())?.is_some();
        if dropped {
            self.cursors.close_all(name);
            tracing::debug!(index = %name, "Index dropped");
        }
        Ok(dropped)
    }

    fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.indexes_tree.contains_key(name.as_bytes())?)
    }

    fn write_document(&self, index: &str, document: &Document) -> Result<()> {
        let bytes = bincode::serialize(document)?;
        self.documents_tree
            .insert(document.key.as_bytes(), bytes)
            .map_err(|e| ClientError::Backend(format!("Failed to write document: {}", e)))?;
        tracing::trace!(index = %index, key = %document.key, "Document written");
        Ok(())
    }

    fn read_document(&self, key: &str) -> Result<Option<Document>> {
        match self.documents_tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize_document(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete_document(&self, key: &str) -> Result<bool> {
        Ok(self.documents_tree.remove(key.as_bytes())?.is_some())
    }

    fn search(&self, index: &str, query: &SearchQuery) -> Result<QueryResult> {
        let (total, documents) = self.evaluate(index, query)?;
        Ok(QueryResult { total, documents })
    }

    fn supports_cursors(&self) -> bool {
        true
    }

    fn cursor_query(
        &self,
        index: &str,
        query: &SearchQuery,
        batch_size: usize,
    ) -> Result<CursorBatch> {
        let (total, documents) = self.evaluate(index, query)?;
        Ok(self.cursors.open(index, total, documents, batch_size))
    }

    fn cursor_read(&self, index: &str, cursor: u64, batch_size: usize) -> Result<CursorBatch> {
        self.cursors.read(index, cursor, batch_size)
    }

    fn cursor_close(&self, index: &str, cursor: u64) -> Result<()> {
        self.cursors.close(index, cursor);
        Ok(())
    }
}
