//! Common test utilities: a sample entity and an instrumented backend

#![allow(dead_code)]

use parking_lot::Mutex;
use redisearch_client::{
    ClientError, ClientSettings, CursorBatch, Document, EntityDescriptor, IndexBackend,
    IndexDefinition, MemoryBackend, QueryResult, Result, SearchClient, SearchQuery,
    SearchableEntity,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub color: String,
    pub description: String,
    pub price_cents: u64,
}

impl SearchableEntity for Product {
    fn persistence_key(&self) -> String {
        self.id.clone()
    }
}

impl Product {
    pub fn descriptor(index: &str) -> EntityDescriptor<Product> {
        EntityDescriptor::builder(index)
            .text_sortable("name", |p: &Product| Some(p.name.clone()))
            .tag("color", |p: &Product| Some(p.color.clone()))
            .text("description", |p: &Product| Some(p.description.clone()))
            .build()
            .unwrap()
    }
}

/// Helper to create a test product
pub fn create_test_product(id: &str, name: &str, color: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        description: format!("{} in {}", name, color),
        price_cents: 999,
    }
}

/// Product `i` of a numbered series; even numbers are red, odd are blue
pub fn numbered_product(i: usize) -> Product {
    let color = if i % 2 == 0 { "red" } else { "blue" };
    create_test_product(&format!("{:05}", i), &format!("product{}", i), color)
}

pub fn settings() -> ClientSettings {
    ClientSettings {
        page_size: 1000,
        cursor_batch_size: 1000,
        ..Default::default()
    }
}

pub fn client_over(backend: Arc<dyn IndexBackend>, index: &str) -> SearchClient<Product> {
    SearchClient::with_json_codec(backend, Product::descriptor(index), settings()).unwrap()
}

pub fn save_products(client: &SearchClient<Product>, count: usize) {
    for i in 0..count {
        client.save(&numbered_product(i)).unwrap();
    }
}

/// Memory backend wrapper that counts calls and injects failures
#[derive(Default)]
pub struct CountingBackend {
    pub inner: MemoryBackend,
    searches: AtomicUsize,
    cursor_queries: AtomicUsize,
    cursor_reads: AtomicUsize,
    cursor_closes: AtomicUsize,
    /// 1-based search call numbers that fail
    failing_searches: Mutex<HashSet<usize>>,
    /// 1-based cursor read numbers that fail
    failing_cursor_reads: Mutex<HashSet<usize>>,
    /// Every document read fails
    failing_reads: AtomicBool,
    /// Every document read finds nothing, as if deleted after the search
    vanishing_reads: AtomicBool,
    /// Report no cursor support
    no_cursors: bool,
    /// Keep handing out a cursor id after the last batch, then answer reads
    /// on it with an empty batch
    sticky_cursor: bool,
    drained_cursors: Mutex<HashSet<u64>>,
}

impl CountingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn without_cursors() -> Arc<Self> {
        Arc::new(Self {
            no_cursors: true,
            ..Default::default()
        })
    }

    pub fn with_sticky_cursor() -> Arc<Self> {
        Arc::new(Self {
            sticky_cursor: true,
            ..Default::default()
        })
    }

    pub fn fail_search(&self, call: usize) {
        self.failing_searches.lock().insert(call);
    }

    pub fn fail_cursor_read(&self, call: usize) {
        self.failing_cursor_reads.lock().insert(call);
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    pub fn vanish_reads(&self) {
        self.vanishing_reads.store(true, Ordering::SeqCst);
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn cursor_queries(&self) -> usize {
        self.cursor_queries.load(Ordering::SeqCst)
    }

    pub fn cursor_reads(&self) -> usize {
        self.cursor_reads.load(Ordering::SeqCst)
    }

    pub fn cursor_closes(&self) -> usize {
        self.cursor_closes.load(Ordering::SeqCst)
    }
}

impl IndexBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        self.inner.create_index(definition)
    }

    fn drop_index(&self, name: &str) -> Result<bool> {
        self.inner.drop_index(name)
    }

    fn index_exists(&self, name: &str) -> Result<bool> {
        self.inner.index_exists(name)
    }

    fn write_document(&self, index: &str, document: &Document) -> Result<()> {
        self.inner.write_document(index, document)
    }

    fn read_document(&self, key: &str) -> Result<Option<Document>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Backend("connection reset".to_string()));
        }
        if self.vanishing_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.read_document(key)
    }

    fn delete_document(&self, key: &str) -> Result<bool> {
        self.inner.delete_document(key)
    }

    fn search(&self, index: &str, query: &SearchQuery) -> Result<QueryResult> {
        let call = self.searches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_searches.lock().contains(&call) {
            return Err(ClientError::Backend(format!(
                "injected search failure #{}",
                call
            )));
        }
        self.inner.search(index, query)
    }

    fn supports_cursors(&self) -> bool {
        !self.no_cursors
    }

    fn cursor_query(
        &self,
        index: &str,
        query: &SearchQuery,
        batch_size: usize,
    ) -> Result<CursorBatch> {
        self.cursor_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.cursor_query(index, query, batch_size)
    }

    fn cursor_read(&self, index: &str, cursor: u64, batch_size: usize) -> Result<CursorBatch> {
        let call = self.cursor_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_cursor_reads.lock().contains(&call) {
            return Err(ClientError::Backend(format!(
                "injected cursor failure #{}",
                call
            )));
        }
        if self.drained_cursors.lock().contains(&cursor) {
            return Ok(CursorBatch {
                total: 0,
                documents: Vec::new(),
                cursor: Some(cursor),
            });
        }

        let mut batch = self.inner.cursor_read(index, cursor, batch_size)?;
        if self.sticky_cursor && batch.cursor.is_none() {
            self.drained_cursors.lock().insert(cursor);
            batch.cursor = Some(cursor);
        }
        Ok(batch)
    }

    fn cursor_close(&self, index: &str, cursor: u64) -> Result<()> {
        self.cursor_closes.fetch_add(1, Ordering::SeqCst);
        self.drained_cursors.lock().remove(&cursor);
        self.inner.cursor_close(index, cursor)
    }
}
