//! Searchable field definitions and their query syntax

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// Index field type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FieldType {
    /// Tokenized, full-text searchable
    Text,
    /// Exact-match, untokenized
    Tag,
}

impl FieldType {
    /// Keyword used in index schema definitions
    pub fn schema_keyword(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Tag => "TAG",
        }
    }
}

/// Backend-facing definition of one indexed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub sortable: bool,
}

/// Extracts the indexed value of a field from an entity
pub type ValueExtractor<E> = Arc<dyn Fn(&E) -> Option<String> + Send + Sync>;

/// One searchable field of an entity type.
///
/// Built once while deriving the entity descriptor and shared read-only by
/// every save and query afterwards.
pub struct SearchableField<E> {
    name: String,
    field_type: FieldType,
    sortable: bool,
    extractor: ValueExtractor<E>,
}

impl<E> SearchableField<E> {
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        sortable: bool,
        extractor: ValueExtractor<E>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            sortable,
            extractor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// Indexed value for this field, `None` when the entity has no value
    pub fn serialize(&self, entity: &E) -> Option<String> {
        (self.extractor)(entity)
    }

    /// Query fragment matching `raw` in this field
    pub fn query_syntax(&self, raw: &str) -> String {
        match self.field_type {
            FieldType::Text => text_syntax(raw),
            FieldType::Tag => tag_syntax(raw),
        }
    }

    pub fn definition(&self) -> FieldDefinition {
        FieldDefinition {
            name: self.name.clone(),
            field_type: self.field_type,
            sortable: self.sortable,
        }
    }
}

impl<E> Clone for SearchableField<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            field_type: self.field_type,
            sortable: self.sortable,
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<E> fmt::Debug for SearchableField<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchableField")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("sortable", &self.sortable)
            .finish()
    }
}

/// Characters with structural meaning inside a text fragment
const TEXT_RESERVED: &[char] = &['\\', '(', ')', '{', '}', '@', '|'];

/// Wrap a tag value in tag delimiters, escaping everything that is not a
/// word character so the value is matched as a single token.
pub fn tag_syntax(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('{');
    for c in raw.chars() {
        if !(c.is_alphanumeric() || c == '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('}');
    out
}

/// Pass a text value through, grouping multi-term values so every term
/// must match within the field.
pub fn text_syntax(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut escaped = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if TEXT_RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    if escaped.chars().any(char::is_whitespace) {
        format!("({})", escaped)
    } else {
        escaped
    }
}
