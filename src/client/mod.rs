//! Client core: typed entity persistence, bounded search and paged streams

mod context;
mod paged;
mod registry;
mod results;
mod search_client;

pub use context::{PageFailureAction, PageFailureHandler, SearchContext};
pub use paged::{PagedResults, PagedSearchResult, ResultStream};
pub use registry::ClientRegistry;
pub use results::{SearchResult, SearchResults};
pub use search_client::SearchClient;
