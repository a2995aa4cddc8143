//! Entity descriptors: the searchable field set of one entity type

use super::field::{FieldDefinition, FieldType, SearchableField, ValueExtractor};
use crate::error::{ClientError, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Hash field reserved for the serialized entity payload
pub const PAYLOAD_FIELD: &str = "sdoc";

/// Query string matching every document in an index
pub const ALL_QUERY: &str = "*";

/// Searchable fields of an entity type, bound to one index
pub struct EntityDescriptor<E> {
    index: String,
    fields: Vec<SearchableField<E>>,
}

impl<E> EntityDescriptor<E> {
    pub fn builder(index: impl Into<String>) -> DescriptorBuilder<E> {
        DescriptorBuilder::new(index)
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Fields in registration order
    pub fn fields(&self) -> &[SearchableField<E>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Result<&SearchableField<E>> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| ClientError::InvalidField(format!("{} (index {})", name, self.index)))
    }

    pub fn definitions(&self) -> Vec<FieldDefinition> {
        self.fields.iter().map(SearchableField::definition).collect()
    }

    /// Indexed values for an entity; fields without a value are left out
    pub fn serialize(&self, entity: &E) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|f| f.serialize(entity).map(|v| (f.name().to_string(), v)))
            .collect()
    }
}

impl<E> Clone for EntityDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EntityDescriptor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("index", &self.index)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Registers searchable fields for an entity type
pub struct DescriptorBuilder<E> {
    index: String,
    fields: Vec<SearchableField<E>>,
}

impl<E> DescriptorBuilder<E> {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            fields: Vec::new(),
        }
    }

    pub fn text<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.field(name, FieldType::Text, false, Arc::new(extractor))
    }

    pub fn text_sortable<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.field(name, FieldType::Text, true, Arc::new(extractor))
    }

    pub fn tag<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.field(name, FieldType::Tag, false, Arc::new(extractor))
    }

    pub fn tag_sortable<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.field(name, FieldType::Tag, true, Arc::new(extractor))
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        sortable: bool,
        extractor: ValueExtractor<E>,
    ) -> Self {
        self.fields
            .push(SearchableField::new(name, field_type, sortable, extractor));
        self
    }

    /// Validate the registered fields.
    ///
    /// Any problem here is a configuration error: the entity type cannot be
    /// used until its registration is fixed.
    pub fn build(self) -> Result<EntityDescriptor<E>> {
        let index = self.index.trim().to_string();
        if index.is_empty() {
            return Err(ClientError::Configuration(
                "index name must not be empty".to_string(),
            ));
        }
        if index.chars().any(char::is_whitespace) {
            return Err(ClientError::Configuration(format!(
                "index name '{}' must not contain whitespace",
                index
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            let name = field.name();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(ClientError::Configuration(format!(
                    "invalid field name '{}' on index {}",
                    name, index
                )));
            }
            if name == PAYLOAD_FIELD {
                return Err(ClientError::Configuration(format!(
                    "field name '{}' is reserved for the document payload",
                    PAYLOAD_FIELD
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(ClientError::Configuration(format!(
                    "duplicate field '{}' on index {}",
                    name, index
                )));
            }
        }

        Ok(EntityDescriptor {
            index,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Product {
        brand: String,
        color: Option<String>,
    }

    fn descriptor() -> EntityDescriptor<Product> {
        EntityDescriptor::builder("product")
            .text_sortable("brand", |p: &Product| Some(p.brand.clone()))
            .tag("color", |p: &Product| p.color.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_fields_keep_registration_order() {
        let d = descriptor();
        let names: Vec<_> = d.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["brand", "color"]);
        assert!(d.field("brand").unwrap().is_sortable());
        assert_eq!(d.field("color").unwrap().field_type(), FieldType::Tag);
    }

    #[test]
    fn test_unknown_field_is_invalid() {
        let err = descriptor().field("size").unwrap_err();
        assert!(matches!(err, ClientError::InvalidField(_)));
    }

    #[test]
    fn test_serialize_skips_missing_values() {
        let d = descriptor();
        let values = d.serialize(&Product {
            brand: "Acme".to_string(),
            color: None,
        });
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("brand").map(String::as_str), Some("Acme"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = EntityDescriptor::builder("product")
            .text("brand", |p: &Product| Some(p.brand.clone()))
            .tag("brand", |p: &Product| Some(p.brand.clone()))
            .build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_reserved_and_blank_names_rejected() {
        let reserved = EntityDescriptor::builder("product")
            .text(PAYLOAD_FIELD, |p: &Product| Some(p.brand.clone()))
            .build();
        assert!(reserved.unwrap_err().is_fatal());

        let blank = DescriptorBuilder::<Product>::new("  ").build();
        assert!(blank.unwrap_err().is_fatal());
    }

    #[test]
    fn test_descriptor_without_fields_is_valid() {
        let d = DescriptorBuilder::<Product>::new("bare").build().unwrap();
        assert!(d.fields().is_empty());
        assert_eq!(d.index_name(), "bare");
    }
}
