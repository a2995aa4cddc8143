//! Typed entity persistence and search over RediSearch-style indexes.
//!
//! An entity type registers its searchable TEXT and TAG fields once through
//! an [`EntityDescriptor`]. A [`SearchClient`] built from that descriptor
//! saves entities as indexed documents, runs intersection queries and
//! streams large result sets page by page, using server-side cursors where
//! the [`IndexBackend`] has them and offset/limit paging where it does not.
//!
//! ```no_run
//! use redisearch_client::{
//!     create_memory_backend, ClientSettings, EntityDescriptor, SearchClient, SearchableEntity,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Sku {
//!     id: String,
//!     brand: String,
//! }
//!
//! impl SearchableEntity for Sku {
//!     fn persistence_key(&self) -> String {
//!         self.id.clone()
//!     }
//! }
//!
//! # fn main() -> redisearch_client::Result<()> {
//! let descriptor = EntityDescriptor::builder("sku")
//!     .tag("brand", |s: &Sku| Some(s.brand.clone()))
//!     .build()?;
//! let client =
//!     SearchClient::with_json_codec(create_memory_backend(), descriptor, ClientSettings::default())?;
//!
//! client.save(&Sku { id: "1".into(), brand: "Acme".into() })?;
//! let found = client.find_by_fields([("brand", "Acme")])?;
//! assert_eq!(found.total_results(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod query;
pub mod schema;

pub use backend::{
    create_backend, create_memory_backend, CursorBatch, Document, IndexBackend, IndexDefinition,
    MemoryBackend, QueryResult, RedisBackend, SledBackend,
};
pub use client::{
    ClientRegistry, PageFailureAction, PagedResults, PagedSearchResult, ResultStream,
    SearchClient, SearchContext, SearchResult, SearchResults,
};
pub use codec::{DocumentCodec, JsonCodec};
pub use config::{ClientSettings, Config};
pub use error::{ClientError, Result};
pub use query::{QueryBuilder, SearchQuery, SortOrder};
pub use schema::{
    DescriptorBuilder, EntityDescriptor, FieldType, SearchableEntity, SearchableField,
};
