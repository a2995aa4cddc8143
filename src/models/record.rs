use crate::config::EntityConfig;
use crate::error::{ClientError, Result};
use crate::schema::{DescriptorBuilder, EntityDescriptor, SearchableEntity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Schema-less JSON entity whose searchable fields come from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Natural key
    pub key: String,

    /// Record body
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(key: impl Into<String>, data: Value) -> Result<Self> {
        match data {
            Value::Object(data) => Ok(Self {
                key: key.into(),
                data,
            }),
            other => Err(ClientError::Serialization(format!(
                "record body must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Indexed value of a top-level attribute.
    ///
    /// Arrays become comma-separated values so each element is its own tag.
    pub fn field_value(&self, name: &str) -> Option<String> {
        match self.data.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect();
                (!values.is_empty()).then(|| values.join(","))
            }
            other => Some(other.to_string()),
        }
    }

    /// Descriptor for records described by an `[entity]` config section
    pub fn descriptor(config: &EntityConfig) -> Result<EntityDescriptor<Record>> {
        let mut builder = DescriptorBuilder::<Record>::new(config.index.clone());
        for field in &config.fields {
            let name = field.name.clone();
            builder = builder.field(
                field.name.clone(),
                field.field_type,
                field.sortable,
                Arc::new(move |record: &Record| record.field_value(&name)),
            );
        }
        builder.build()
    }
}

impl SearchableEntity for Record {
    fn persistence_key(&self) -> String {
        self.key.clone()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
