use serde_json::Value as JsonValue;

use super::field::FieldDescriptor;
use super::key::{DocumentId, KeyValue};
use crate::{Error, Result};

/// Joins the components of a composite key.
pub const KEY_SEPARATOR: &str = "__";

/// Ordered key fields of a document type, used to compute backend ids.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyDescriptor {
    fields: Vec<FieldDescriptor>,
}

impl PrimaryKeyDescriptor {
    /// Fields are sorted by key order then backend field name.
    ///
    /// A single field may use any order, 0 included. Composite keys number
    /// their fields `1..=n` without gaps or repeats, matching the positions
    /// of composite identifiers.
    pub fn new(mut fields: Vec<FieldDescriptor>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::Configuration(
                "A primary key needs at least one field".to_string(),
            ));
        }

        fields.sort_by(|a, b| {
            a.key_order()
                .cmp(&b.key_order())
                .then_with(|| a.field_name.cmp(&b.field_name))
        });

        if fields.len() > 1 {
            for (position, field) in fields.iter().enumerate() {
                let expected = position as u32 + 1;
                if field.key_order() != expected {
                    return Err(Error::Configuration(format!(
                        "Composite primary key field \"{}\" has key order {}, expected {} (orders must run 1..={})",
                        field.property_name,
                        field.key_order(),
                        expected,
                        fields.len()
                    )));
                }
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// Backend id of a serialized document.
    pub fn key_from_document(&self, document: &JsonValue) -> Result<String> {
        if let [field] = self.fields.as_slice() {
            return field
                .value(document)
                .and_then(KeyValue::from_json)
                .map(|v| v.to_string())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "Document has no value for key field \"{}\"",
                        field.field_name
                    ))
                });
        }

        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| f.value(document).and_then(KeyValue::from_json))
            .map(|v| v.to_string())
            .collect();

        if parts.is_empty() {
            return Err(Error::Configuration(
                "Document has no value for any composite key field".to_string(),
            ));
        }

        Ok(parts.join(KEY_SEPARATOR))
    }

    /// Backend id of a document identifier given to the index facade.
    pub fn key_from_id(&self, id: &DocumentId) -> Result<String> {
        match (id, self.is_composite()) {
            (DocumentId::Single(value), false) => Ok(value.to_string()),
            (DocumentId::Single(_), true) => Err(Error::Configuration(format!(
                "Composite key of {} fields expects a tuple identifier, got {}",
                self.fields.len(),
                id
            ))),
            (DocumentId::Composite(values), false) => match values.as_slice() {
                [Some(value)] => Ok(value.to_string()),
                _ => Err(Error::Configuration(format!(
                    "Single-field key expects a scalar identifier, got {}",
                    id
                ))),
            },
            (DocumentId::Composite(values), true) => {
                if values.len() != self.fields.len() {
                    return Err(Error::Configuration(format!(
                        "Identifier {} has {} components, the key has {} fields",
                        id,
                        values.len(),
                        self.fields.len()
                    )));
                }

                // Null components are skipped like null document values.
                let parts: Vec<String> = values.iter().flatten().map(|v| v.to_string()).collect();
                if parts.is_empty() {
                    return Err(Error::Configuration(format!(
                        "Identifier {} has no non-null component",
                        id
                    )));
                }

                Ok(parts.join(KEY_SEPARATOR))
            }
        }
    }
}
