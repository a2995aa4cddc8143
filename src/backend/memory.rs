use super::cursor::CursorRegistry;
use super::{evaluator, CursorBatch, Document, IndexBackend, IndexDefinition, QueryResult};
use crate::error::{ClientError, Result};
use crate::query::SearchQuery;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory index backend (for tests and local use)
#[derive(Clone)]
pub struct MemoryBackend {
    documents: Arc<DashMap<String, Document>>,
    indexes: Arc<DashMap<String, IndexDefinition>>,
    cursors: Arc<CursorRegistry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            indexes: Arc::new(DashMap::new()),
            cursors: Arc::new(CursorRegistry::new()),
        }
    }

    /// Number of cursors not yet exhausted or closed
    pub fn open_cursors(&self) -> usize {
        self.cursors.open_count()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn definition(&self, index: &str) -> Result<IndexDefinition> {
        self.indexes
            .get(index)
            .map(|d| d.value().clone())
            .ok_or_else(|| ClientError::UnknownIndex(index.to_string()))
    }

    fn evaluate(&self, index: &str, query: &SearchQuery) -> Result<(u64, Vec<Document>)> {
        let definition = self.definition(index)?;
        let candidates: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.key().starts_with(&definition.prefix))
            .map(|entry| entry.value().clone())
            .collect();
        evaluator::execute(&definition, candidates, query)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        if self.indexes.contains_key(&definition.name) {
            return Err(ClientError::Backend(format!(
                "Index already exists: {}",
                definition.name
            )));
        }
        self.indexes
            .insert(definition.name.clone(), definition.clone());
        tracing::debug!(index = %definition.name, prefix = %definition.prefix, "Index created");
        Ok(())
    }

    fn drop_index(&self, name: &str) -> Result<bool> {
        let dropped = self.indexes.remove(name).is_some();
        if dropped {
            self.cursors.close_all(name);
            tracing::debug!(index = %name, "Index dropped");
        }
        Ok(dropped)
    }

    fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.indexes.contains_key(name))
    }

    fn write_document(&self, index: &str, document: &Document) -> Result<()> {
        self.documents.insert(document.key.clone(), document.clone());
        tracing::trace!(index = %index, key = %document.key, "Document written");
        Ok(())
    }

    fn read_document(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.documents.get(key).map(|entry| entry.clone()))
    }

    fn delete_document(&self, key: &str) -> Result<bool> {
        Ok(self.documents.remove(key).is_some())
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
