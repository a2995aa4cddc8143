//! Schema derivation for searchable entity types
//!
//! An entity type registers its searchable fields once through a
//! [`DescriptorBuilder`]. The resulting [`EntityDescriptor`] drives index
//! creation, per-field value extraction on save, and query fragment syntax.

mod descriptor;
mod field;

pub use descriptor::{DescriptorBuilder, EntityDescriptor, ALL_QUERY, PAYLOAD_FIELD};
pub use field::{
    tag_syntax, text_syntax, FieldDefinition, FieldType, SearchableField, ValueExtractor,
};

use serde::{de::DeserializeOwned, Serialize};

/// An entity that can be saved to and searched from an index
pub trait SearchableEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Natural key, unique within the entity's index
    fn persistence_key(&self) -> String;
}
