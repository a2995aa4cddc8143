//! Paginated result streams
//!
//! A [`PagedResults`] fetches its first batch when it is created and every
//! later batch only when the consumer pulls past the end of the previous
//! one. Pages are fetched strictly in order; a stream cannot be restarted.

use super::context::{PageFailureAction, PageFailureHandler};
use super::search_client::SearchClient;
use crate::backend::Document;
use crate::error::{ClientError, Result};
use crate::metrics::{record_decode_failures, record_page_fetch, timed};
use crate::query::SearchQuery;
use crate::schema::SearchableEntity;
use rayon::prelude::*;

const CLIENT_SIDE: &str = "client_side";
const CURSOR: &str = "cursor";

enum PageSource {
    ClientSide {
        query: SearchQuery,
        page_size: usize,
        next_offset: usize,
        end: usize,
        failure_handler: Option<PageFailureHandler>,
    },
    Cursor {
        cursor: Option<u64>,
        batch_size: usize,
    },
}

/// Lazily fetched result set of one query
pub struct PagedResults<E: SearchableEntity> {
    client: SearchClient<E>,
    total: u64,
    include_content: bool,
    first: Option<Vec<Document>>,
    source: PageSource,
    exhausted: bool,
    pages_fetched: usize,
}

impl<E: SearchableEntity> PagedResults<E> {
    pub(crate) fn client_side(
        client: SearchClient<E>,
        query: SearchQuery,
        page_size: usize,
        failure_handler: Option<PageFailureHandler>,
    ) -> Result<Self> {
        let start = query.offset;
        let page = query
            .clone()
            .with_offset(start)
            .with_limit(page_size.min(query.limit));
        let result = timed("search", client.index_name(), || {
            client.backend().search(client.index_name(), &page)
        })?;
        record_page_fetch(client.index_name(), CLIENT_SIDE);

        let total = result.total;
        let end = usize::try_from(total)
            .unwrap_or(usize::MAX)
            .min(start.saturating_add(query.limit));
        let fetched = result.documents.len();
        let next_offset = start + fetched;
        let exhausted = fetched < page.limit || next_offset >= end;

        tracing::debug!(
            index = %client.index_name(),
            total,
            page_size,
            "Opened client-side paged search"
        );

        Ok(Self {
            include_content: query.include_content,
            client,
            total,
            first: Some(result.documents),
            source: PageSource::ClientSide {
                query,
                page_size,
                next_offset,
                end,
                failure_handler,
            },
            exhausted,
            pages_fetched: 1,
        })
    }

    pub(crate) fn with_cursor(
        client: SearchClient<E>,
        query: SearchQuery,
        batch_size: usize,
    ) -> Result<Self> {
        let batch = timed("cursor_query", client.index_name(), || {
            client
                .backend()
                .cursor_query(client.index_name(), &query, batch_size)
        })?;
        record_page_fetch(client.index_name(), CURSOR);

        tracing::debug!(
            index = %client.index_name(),
            total = batch.total,
            batch_size,
            cursor = ?batch.cursor,
            "Opened cursor search"
        );

        let exhausted = batch.documents.is_empty() || batch.cursor.is_none();
        let mut results = Self {
            include_content: query.include_content,
            client,
            total: batch.total,
            first: Some(batch.documents),
            source: PageSource::Cursor {
                cursor: batch.cursor,
                batch_size,
            },
            exhausted,
            pages_fetched: 1,
        };
        if exhausted {
            results.close_cursor();
        }
        Ok(results)
    }

    /// Match count reported when the stream was opened
    pub fn total_results(&self) -> u64 {
        self.total
    }

    /// Pages or cursor batches fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self.source, PageSource::Cursor { .. })
    }

    /// Turn the result set into a lazy sequence of results.
    ///
    /// With `parallel` set, each fetched batch is resolved on the rayon pool
    /// before its items are handed out; fetching stays sequential.
    pub fn result_stream(self, parallel: bool) -> ResultStream<E> {
        ResultStream {
            pages: self,
            current: Vec::new().into_iter(),
            parallel,
        }
    }

    /// Natural keys of every match, fetching pages as needed
    pub fn keys(self) -> impl Iterator<Item = Result<String>> {
        self.result_stream(false)
            .map(|item| item.map(|r| r.key().to_string()))
    }

    /// Next batch of documents; `None` once the stream is finished
    fn next_batch(&mut self) -> Option<Result<Vec<Document>>> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }

        while !self.exhausted {
            let fetched = if self.is_cursor() {
                self.next_cursor_batch()
            } else {
                self.next_page()
            };
            if fetched.is_some() {
                return fetched;
            }
        }
        None
    }

    /// One client-side page. `None` means the page was skipped.
    fn next_page(&mut self) -> Option<Result<Vec<Document>>> {
        let PageSource::ClientSide {
            query,
            page_size,
            next_offset,
            end,
            failure_handler,
        } = &mut self.source
        else {
            return None;
        };

        let offset = *next_offset;
        let requested = (*page_size).min(end.saturating_sub(offset));
        if requested == 0 {
            self.exhausted = true;
            return None;
        }

        let page = query.clone().with_offset(offset).with_limit(requested);
        let client = &self.client;
        let result = timed("search", client.index_name(), || {
            client.backend().search(client.index_name(), &page)
        });
        self.pages_fetched += 1;
        record_page_fetch(client.index_name(), CLIENT_SIDE);

        match result {
            Ok(result) => {
                let fetched = result.documents.len();
                *next_offset = offset + fetched;
                if fetched < requested || *next_offset >= *end {
                    self.exhausted = true;
                }
                Some(Ok(result.documents))
            }
            Err(e) => {
                tracing::warn!(
                    index = %client.index_name(),
                    offset,
                    error = %e,
                    "Page fetch failed"
                );
                match failure_handler.as_ref().map(|handler| handler(&e)) {
                    Some(PageFailureAction::Continue) => {
                        *next_offset = offset + requested;
                        if *next_offset >= *end {
                            self.exhausted = true;
                        }
                        None
                    }
                    Some(PageFailureAction::Halt) => {
                        self.exhausted = true;
                        None
                    }
                    None => {
                        self.exhausted = true;
                        Some(Err(e))
                    }
                }
            }
        }
    }

    fn next_cursor_batch(&mut self) -> Option<Result<Vec<Document>>> {
        let PageSource::Cursor { cursor, batch_size } = &mut self.source else {
            return None;
        };
        let Some(id) = *cursor else {
            self.exhausted = true;
            return None;
        };

        let client = &self.client;
        let batch_size = *batch_size;
        let result = timed("cursor_read", client.index_name(), || {
            client
                .backend()
                .cursor_read(client.index_name(), id, batch_size)
        });
        self.pages_fetched += 1;
        record_page_fetch(client.index_name(), CURSOR);

        match result {
            Ok(batch) => {
                *cursor = batch.cursor;
                if batch.documents.is_empty() {
                    self.exhausted = true;
                    self.close_cursor();
                    return None;
                }
                if batch.cursor.is_none() {
                    self.exhausted = true;
                }
                Some(Ok(batch.documents))
            }
            Err(e) => {
                tracing::warn!(
                    index = %client.index_name(),
                    cursor = id,
                    error = %e,
                    "Cursor read failed"
                );
                self.exhausted = true;
                self.close_cursor();
                Some(Err(e))
            }
        }
    }

    fn close_cursor(&mut self) {
        if let PageSource::Cursor { cursor, .. } = &mut self.source {
            if let Some(id) = cursor.take() {
                if let Err(e) = self.client.backend().cursor_close(self.client.index_name(), id) {
                    tracing::debug!(cursor = id, error = %e, "Failed to close cursor");
                }
            }
        }
    }

    fn to_results(&self, documents: Vec<Document>, parallel: bool) -> Vec<PagedSearchResult<E>> {
        let client = &self.client;
        let include_content = self.include_content;
        let make = |document: Document| PagedSearchResult::new(client, document, include_content);

        if parallel {
            documents
                .into_par_iter()
                .map(|document| make(document).resolved())
                .collect()
        } else {
            documents.into_iter().map(make).collect()
        }
    }
}

impl<E: SearchableEntity> Drop for PagedResults<E> {
    fn drop(&mut self) {
        self.close_cursor();
    }
}

enum ResultState<E> {
    Payload(Vec<u8>),
    Fetch,
    Resolved(Result<Option<E>>),
}

/// One match of a paged search
pub struct PagedSearchResult<E: SearchableEntity> {
    key: String,
    document_key: String,
    client: SearchClient<E>,
    state: ResultState<E>,
}

impl<E: SearchableEntity> PagedSearchResult<E> {
    fn new(client: &SearchClient<E>, document: Document, include_content: bool) -> Self {
        let state = match (include_content, document.payload) {
            (true, Some(payload)) => ResultState::Payload(payload),
            (true, None) => ResultState::Resolved(count_failure(
                client.index_name(),
                Err(ClientError::decode(&document.key, "document has no payload")),
            )),
            (false, _) => ResultState::Fetch,
        };
        Self {
            key: client.natural_key(&document.key),
            document_key: document.key,
            client: client.clone(),
            state,
        }
    }

    /// Natural key of the match
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    /// Resolve the entity.
    ///
    /// Decodes the fetched payload, or reads the document by key when the
    /// search returned keys only. `Ok(None)` means the document was deleted
    /// after the search ran.
    pub fn result(self) -> Result<Option<E>> {
        match self.state {
            ResultState::Resolved(result) => result,
            ResultState::Payload(payload) => {
                let decoded = self
                    .client
                    .decode_payload(&self.document_key, &payload)
                    .map(Some);
                count_failure(self.client.index_name(), decoded)
            }
            ResultState::Fetch => {
                let fetched = self.client.fetch_entity(&self.document_key);
                count_failure(self.client.index_name(), fetched)
            }
        }
    }

    fn resolved(self) -> Self {
        match self.state {
            ResultState::Resolved(_) => self,
            _ => {
                let key = self.key.clone();
                let document_key = self.document_key.clone();
                let client = self.client.clone();
                let result = self.result();
                Self {
                    key,
                    document_key,
                    client,
                    state: ResultState::Resolved(result),
                }
            }
        }
    }
}

/// Each item counts its own decode failure, whether it is resolved by the
/// caller or on the rayon pool
fn count_failure<E>(index: &str, result: Result<Option<E>>) -> Result<Option<E>> {
    if matches!(result, Err(ClientError::Decode { .. })) {
        record_decode_failures(index, 1);
    }
    result
}

impl<E: SearchableEntity> std::fmt::Debug for PagedSearchResult<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            ResultState::Payload(_) => "payload",
            ResultState::Fetch => "fetch",
            ResultState::Resolved(Ok(_)) => "resolved",
            ResultState::Resolved(Err(_)) => "failed",
        };
        f.debug_struct("PagedSearchResult")
            .field("key", &self.key)
            .field("state", &state)
            .finish()
    }
}

/// Pull-based sequence over a [`PagedResults`]
pub struct ResultStream<E: SearchableEntity> {
    pages: PagedResults<E>,
    current: std::vec::IntoIter<PagedSearchResult<E>>,
    parallel: bool,
}

impl<E: SearchableEntity> ResultStream<E> {
    pub fn total_results(&self) -> u64 {
        self.pages.total_results()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages.pages_fetched()
    }
}

impl<E: SearchableEntity> Iterator for ResultStream<E> {
    type Item = Result<PagedSearchResult<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(Ok(item));
            }
            match self.pages.next_batch()? {
                Ok(documents) => {
                    self.current = self.pages.to_results(documents, self.parallel).into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
