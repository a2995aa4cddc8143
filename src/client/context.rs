use crate::error::ClientError;
use crate::query::{SortBy, SortOrder};
use std::fmt;
use std::sync::Arc;

/// What a result stream does after a page fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFailureAction {
    /// Skip the failed page and fetch the next one
    Continue,
    /// End the stream
    Halt,
}

/// Called once per failed page fetch during client-side paging
pub type PageFailureHandler = Arc<dyn Fn(&ClientError) -> PageFailureAction + Send + Sync>;

/// Per-call query configuration
#[derive(Clone, Default)]
pub struct SearchContext {
    pub(crate) filters: Vec<(String, String)>,
    pub(crate) sort: Option<SortBy>,
    pub(crate) offset: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) keys_only: bool,
    pub(crate) use_client_side_paging: bool,
    pub(crate) page_size: Option<usize>,
    pub(crate) failure_handler: Option<PageFailureHandler>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to match `value`
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn with_filters<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.filters
            .extend(filters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortBy {
            field: field.into(),
            order,
        });
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fetch keys only; entities are read by key when a result is resolved
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn include_content(mut self, include: bool) -> Self {
        self.keys_only = !include;
        self
    }

    /// Page with offset/limit queries even when the backend has cursors
    pub fn client_side_paging(mut self, enabled: bool) -> Self {
        self.use_client_side_paging = enabled;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn on_page_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ClientError) -> PageFailureAction + Send + Sync + 'static,
    {
        self.failure_handler = Some(Arc::new(handler));
        self
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }
}

impl fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchContext")
            .field("filters", &self.filters)
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("keys_only", &self.keys_only)
            .field("use_client_side_paging", &self.use_client_side_paging)
            .field("page_size", &self.page_size)
            .field("failure_handler", &self.failure_handler.is_some())
            .finish()
    }
}
