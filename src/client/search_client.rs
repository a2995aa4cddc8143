use super::context::SearchContext;
use super::paged::PagedResults;
use super::results::{SearchResult, SearchResults};
use crate::backend::{Document, IndexBackend, IndexDefinition};
use crate::codec::{DocumentCodec, JsonCodec};
use crate::config::ClientSettings;
use crate::error::{ClientError, Result};
use crate::metrics::{record_decode_failures, timed};
use crate::query::{QueryBuilder, SearchQuery};
use crate::schema::{EntityDescriptor, SearchableEntity, SearchableField};
use std::sync::Arc;

struct ClientInner<E> {
    backend: Arc<dyn IndexBackend>,
    codec: Arc<dyn DocumentCodec<E>>,
    descriptor: EntityDescriptor<E>,
    settings: ClientSettings,
    key_prefix: String,
}

/// Typed client for one entity type and its index.
///
/// Cloning is cheap; clones share the backend, codec and descriptor.
pub struct SearchClient<E> {
    inner: Arc<ClientInner<E>>,
}

impl<E> Clone for SearchClient<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: SearchableEntity> SearchClient<E> {
    /// Build a client and make sure its index exists
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        codec: Arc<dyn DocumentCodec<E>>,
        descriptor: EntityDescriptor<E>,
        settings: ClientSettings,
    ) -> Result<Self> {
        settings.validate()?;

        let key_prefix = format!("{}{}", descriptor.index_name(), settings.key_separator);
        let client = Self {
            inner: Arc::new(ClientInner {
                backend,
                codec,
                descriptor,
                settings,
                key_prefix,
            }),
        };

        client.ensure_index()?;
        Ok(client)
    }

    /// Build a client using the JSON codec, compressed per `settings`
    pub fn with_json_codec(
        backend: Arc<dyn IndexBackend>,
        descriptor: EntityDescriptor<E>,
        settings: ClientSettings,
    ) -> Result<Self> {
        let codec = Arc::new(JsonCodec::<E>::new(settings.use_compression));
        Self::new(backend, codec, descriptor, settings)
    }

    pub fn index_name(&self) -> &str {
        self.inner.descriptor.index_name()
    }

    pub fn descriptor(&self) -> &EntityDescriptor<E> {
        &self.inner.descriptor
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.inner.backend
    }

    /// Index schema derived from the entity descriptor
    pub fn index_definition(&self) -> IndexDefinition {
        IndexDefinition {
            name: self.index_name().to_string(),
            prefix: self.inner.key_prefix.clone(),
            fields: self.inner.descriptor.definitions(),
        }
    }

    fn ensure_index(&self) -> Result<()> {
        let backend = &self.inner.backend;
        timed("ensure_index", self.index_name(), || {
            if backend.index_exists(self.index_name())? {
                tracing::debug!(index = %self.index_name(), "Index already exists");
                return Ok(());
            }
            backend.create_index(&self.index_definition())?;
            tracing::info!(
                index = %self.index_name(),
                backend = backend.name(),
                fields = self.inner.descriptor.fields().len(),
                "Created index"
            );
            Ok(())
        })
    }

    /// Drop the index if present and create it from the current descriptor
    pub fn recreate_index(&self) -> Result<()> {
        let backend = &self.inner.backend;
        timed("recreate_index", self.index_name(), || {
            backend.drop_index(self.index_name())?;
            backend.create_index(&self.index_definition())?;
            tracing::info!(index = %self.index_name(), "Recreated index");
            Ok(())
        })
    }

    /// Drop the index definition; a missing index is not an error
    pub fn drop_index(&self) -> Result<()> {
        timed("drop_index", self.index_name(), || {
            if !self.inner.backend.drop_index(self.index_name())? {
                tracing::debug!(index = %self.index_name(), "Index to drop did not exist");
            }
            Ok(())
        })
    }

    /// Number of documents in the index, without transferring any of them
    pub fn key_count(&self) -> Result<u64> {
        let query = self.query_builder().match_all(Some(0), Some(0), false);
        timed("key_count", self.index_name(), || {
            Ok(self.inner.backend.search(self.index_name(), &query)?.total)
        })
    }

    /// Look up a searchable field by name
    pub fn field(&self, name: &str) -> Result<&SearchableField<E>> {
        self.inner.descriptor.field(name)
    }

    /// Write an entity, replacing any document stored under its key
    pub fn save(&self, entity: &E) -> Result<()> {
        let document = self.to_document(entity)?;
        timed("save", self.index_name(), || {
            self.inner
                .backend
                .write_document(self.index_name(), &document)
        })
    }

    /// Remove an entity by natural key; `false` when nothing was stored
    pub fn delete(&self, key: &str) -> Result<bool> {
        let document_key = self.document_key(key);
        timed("delete", self.index_name(), || {
            self.inner.backend.delete_document(&document_key)
        })
    }

    pub fn find_by_key(&self, key: &str) -> Result<Option<E>> {
        let document_key = self.document_key(key);
        let document = timed("find_by_key", self.index_name(), || {
            self.inner.backend.read_document(&document_key)
        })?;

        match document {
            Some(document) => self.decode_document(&document).map(Some),
            None => Ok(None),
        }
    }

    /// Bounded search matching every `(field, value)` pair
    pub fn find_by_fields<I, K, V>(&self, filters: I) -> Result<SearchResults<E>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.find(&SearchContext::new().with_filters(filters))
    }

    /// Bounded search; every match in the window is decoded eagerly
    pub fn find(&self, context: &SearchContext) -> Result<SearchResults<E>> {
        let query = self.build_query(context)?;
        let result = timed("find", self.index_name(), || {
            self.inner.backend.search(self.index_name(), &query)
        })?;

        let mut results = Vec::with_capacity(result.documents.len());
        let mut decode_failures = Vec::new();
        for document in &result.documents {
            let key = self.natural_key(&document.key);
            let decoded = if query.include_content {
                self.decode_document(document)
            } else {
                match self.fetch_entity(&document.key) {
                    Ok(Some(entity)) => Ok(entity),
                    Ok(None) => Err(ClientError::decode(&document.key, "document vanished")),
                    Err(e) => Err(e),
                }
            };
            match decoded {
                Ok(entity) => results.push(SearchResult { key, entity }),
                Err(e @ ClientError::Decode { .. }) => {
                    tracing::warn!(index = %self.index_name(), key = %key, error = %e, "Skipping undecodable document");
                    decode_failures.push(key);
                }
                Err(e) => return Err(e),
            }
        }
        record_decode_failures(self.index_name(), decode_failures.len());

        Ok(SearchResults {
            total: result.total,
            results,
            decode_failures,
        })
    }

    /// Stream every match of a query, page by page
    pub fn search(&self, context: &SearchContext) -> Result<PagedResults<E>> {
        let query = self.build_query(context)?;
        let page_size = context.page_size.unwrap_or(self.inner.settings.page_size);
        if page_size == 0 {
            return Err(ClientError::Configuration(
                "page size must be greater than zero".to_string(),
            ));
        }

        let use_cursor = !context.use_client_side_paging && self.inner.backend.supports_cursors();
        if !context.use_client_side_paging && !use_cursor {
            tracing::info!(
                index = %self.index_name(),
                backend = self.inner.backend.name(),
                "Backend has no cursor support, paging client-side"
            );
        }

        if use_cursor {
            let batch_size = context
                .page_size
                .unwrap_or(self.inner.settings.cursor_batch_size);
            PagedResults::with_cursor(self.clone(), query, batch_size)
        } else {
            PagedResults::client_side(
                self.clone(),
                query,
                page_size,
                context.failure_handler.clone(),
            )
        }
    }

    /// Stream every document in the index, up to `limit`
    pub fn find_all(&self, limit: Option<usize>) -> Result<PagedResults<E>> {
        let mut context = SearchContext::new();
        if let Some(limit) = limit {
            context = context.limit(limit);
        }
        self.search(&context)
    }

    /// Context filtering on `filters`, validated against the descriptor
    pub fn paging_context_with_fields<I, K, V>(&self, filters: I) -> Result<SearchContext>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let context = SearchContext::new().with_filters(filters);
        for (name, _) in context.filters() {
            self.field(name)?;
        }
        Ok(context)
    }

    /// Document written for an entity: indexed values plus encoded payload
    pub fn to_document(&self, entity: &E) -> Result<Document> {
        let payload = self.inner.codec.encode(entity)?;
        Ok(Document {
            key: self.document_key(&entity.persistence_key()),
            fields: self.inner.descriptor.serialize(entity),
            payload: Some(payload),
        })
    }

    /// Backend key for a natural key
    pub fn document_key(&self, key: &str) -> String {
        format!("{}{}", self.inner.key_prefix, key)
    }

    /// Natural key for a backend key
    pub fn natural_key(&self, document_key: &str) -> String {
        document_key
            .strip_prefix(&self.inner.key_prefix)
            .unwrap_or(document_key)
            .to_string()
    }

    pub(crate) fn decode_document(&self, document: &Document) -> Result<E> {
        let payload = document
            .payload
            .as_deref()
            .ok_or_else(|| ClientError::decode(&document.key, "document has no payload"))?;
        self.decode_payload(&document.key, payload)
    }

    pub(crate) fn decode_payload(&self, document_key: &str, payload: &[u8]) -> Result<E> {
        self.inner.codec.decode(document_key, payload)
    }

    /// Read and decode one document by backend key
    pub(crate) fn fetch_entity(&self, document_key: &str) -> Result<Option<E>> {
        match self.inner.backend.read_document(document_key)? {
            Some(document) => self.decode_document(&document).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn query_builder(&self) -> QueryBuilder<'_, E> {
        QueryBuilder::new(
            &self.inner.descriptor,
            self.inner.settings.default_result_limit,
        )
    }

    fn build_query(&self, context: &SearchContext) -> Result<SearchQuery> {
        let builder = self.query_builder();
        let mut query = builder
            .intersection(context.filters.iter().map(|(k, v)| (k.as_str(), v.as_str())))?
            .with_offset(context.offset.unwrap_or(0))
            .with_limit(
                context
                    .limit
                    .unwrap_or(self.inner.settings.default_result_limit),
            )
            .with_content(!context.keys_only);

        if let Some(sort) = &context.sort {
            self.field(&sort.field)?;
            query = query.with_sort(sort.field.clone(), sort.order);
        }

        tracing::trace!(index = %self.index_name(), query = %query.query, "Built query");
        Ok(query)
    }
}

impl<E> std::fmt::Debug for SearchClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("index", &self.inner.descriptor.index_name())
            .field("backend", &self.inner.backend.name())
            .field("codec", &self.inner.codec.codec_id())
            .finish()
    }
}
