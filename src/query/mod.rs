//! Search query values and the query builder

use crate::error::{ClientError, Result};
use crate::schema::{EntityDescriptor, ALL_QUERY};
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

/// Sort order for search results
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    #[strum(serialize = "asc", serialize = "ascending")]
    Ascending,
    #[strum(serialize = "desc", serialize = "descending")]
    Descending,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Field to sort by
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub order: SortOrder,
}

/// One query execution against an index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query string in the index query syntax
    pub query: String,

    /// Offset of the first returned document
    pub offset: usize,

    /// Maximum number of documents returned
    pub limit: usize,

    /// Return stored payloads, not just keys
    pub include_content: bool,

    /// Sorting criteria; backend order when absent
    pub sort: Option<SortBy>,
}

impl SearchQuery {
    /// Create a new query returning content, with no window
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            offset: 0,
            limit: usize::MAX,
            include_content: true,
            sort: None,
        }
    }

    /// Query matching every document
    pub fn match_all() -> Self {
        Self::new(ALL_QUERY)
    }

    /// Set offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Return keys only
    pub fn without_content(mut self) -> Self {
        self.include_content = false;
        self
    }

    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }

    /// Set sorting
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortBy {
            field: field.into(),
            order,
        });
        self
    }

    pub fn is_match_all(&self) -> bool {
        self.query.trim() == ALL_QUERY
    }
}

/// Builds queries for one entity type
pub struct QueryBuilder<'a, E> {
    descriptor: &'a EntityDescriptor<E>,
    default_limit: usize,
}

impl<'a, E> QueryBuilder<'a, E> {
    pub fn new(descriptor: &'a EntityDescriptor<E>, default_limit: usize) -> Self {
        Self {
            descriptor,
            default_limit,
        }
    }

    /// AND together one fragment per `(field, value)` pair.
    ///
    /// Fragments appear in input order. An empty filter set matches every
    /// document.
    pub fn intersection<I, K, V>(&self, filters: I) -> Result<SearchQuery>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = self.intersection_string(filters)?;
        Ok(SearchQuery::new(query).with_limit(self.default_limit))
    }

    pub fn intersection_string<I, K, V>(&self, filters: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fragments = Vec::new();
        for (name, value) in filters {
            let field = self.descriptor.field(name.as_ref())?;
            if value.as_ref().trim().is_empty() {
                return Err(ClientError::InvalidField(format!(
                    "{} (index {}): filter value must not be blank",
                    field.name(),
                    self.descriptor.index_name()
                )));
            }
            fragments.push(format!(
                "@{}:{}",
                field.name(),
                field.query_syntax(value.as_ref())
            ));
        }

        if fragments.is_empty() {
            Ok(ALL_QUERY.to_string())
        } else {
            Ok(fragments.join(" "))
        }
    }

    /// Wildcard query over `[offset, offset + limit)`
    pub fn match_all(
        &self,
        offset: Option<usize>,
        limit: Option<usize>,
        include_content: bool,
    ) -> SearchQuery {
        SearchQuery::match_all()
            .with_offset(offset.unwrap_or(0))
            .with_limit(limit.unwrap_or(self.default_limit))
            .with_content(include_content)
    }
}
