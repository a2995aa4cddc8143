use serde::Serialize;

/// One decoded match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<E> {
    /// Natural key of the entity
    pub key: String,
    pub entity: E,
}

/// Eagerly decoded results of a single bounded query
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults<E> {
    /// Total matches reported by the backend, not limited by the window
    pub total: u64,

    pub results: Vec<SearchResult<E>>,

    /// Keys whose stored payload was missing or could not be decoded
    pub decode_failures: Vec<String>,
}

impl<E> SearchResults<E> {
    pub fn total_results(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchResult<E>> {
        self.results.iter()
    }

    /// Drop keys and keep the decoded entities
    pub fn into_entities(self) -> Vec<E> {
        self.results.into_iter().map(|r| r.entity).collect()
    }
}

impl<E> IntoIterator for SearchResults<E> {
    type Item = SearchResult<E>;
    type IntoIter = std::vec::IntoIter<SearchResult<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
