use std::collections::HashMap;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::field::{FieldCategory, FieldDescriptor};
use super::primary_key::PrimaryKeyDescriptor;
use crate::{Error, Result};

/// Field set and key of one document type. Built once, shared read-only.
#[derive(Debug, Clone)]
pub struct DocumentDefinition {
    document_type: String,
    fields: Vec<FieldDescriptor>,
    by_property: HashMap<String, usize>,
    primary_key: PrimaryKeyDescriptor,
    security_field: Option<usize>,
}

impl DocumentDefinition {
    pub fn builder(document_type: impl Into<String>) -> DocumentDefinitionBuilder {
        DocumentDefinitionBuilder {
            document_type: document_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn primary_key(&self) -> &PrimaryKeyDescriptor {
        &self.primary_key
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.by_property.contains_key(property)
    }

    pub fn try_field(&self, property: &str) -> Option<&FieldDescriptor> {
        self.by_property.get(property).map(|&i| &self.fields[i])
    }

    /// Field for a property, or a configuration error naming the document type.
    pub fn field(&self, property: &str) -> Result<&FieldDescriptor> {
        self.try_field(property).ok_or_else(|| {
            Error::Configuration(format!(
                "The document \"{}\" has no \"{}\" property",
                self.document_type, property
            ))
        })
    }

    /// Full-text fields, in declaration order.
    pub fn search_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_full_text())
    }

    pub fn security_field(&self) -> Option<&FieldDescriptor> {
        self.security_field.map(|i| &self.fields[i])
    }

    /// Index mapping body derived from the field categories.
    pub fn index_mapping(&self) -> JsonValue {
        let properties: JsonMap<String, JsonValue> = self
            .fields
            .iter()
            .map(|f| (f.field_name.clone(), f.mapping()))
            .collect();

        json!({ "properties": properties })
    }
}

pub struct DocumentDefinitionBuilder {
    document_type: String,
    fields: Vec<FieldDescriptor>,
}

impl DocumentDefinitionBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<DocumentDefinition> {
        let document_type = self.document_type;
        if document_type.trim().is_empty() {
            return Err(Error::Configuration(
                "Document type name must not be empty".to_string(),
            ));
        }

        let mut by_property = HashMap::with_capacity(self.fields.len());
        let mut security_field = None;

        for (i, field) in self.fields.iter().enumerate() {
            if by_property.insert(field.property_name.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "The document \"{}\" declares the \"{}\" property twice",
                    document_type, field.property_name
                )));
            }

            if field.category == FieldCategory::Security && security_field.replace(i).is_some() {
                return Err(Error::Configuration(format!(
                    "The document \"{}\" declares more than one security field",
                    document_type
                )));
            }
        }

        if self.fields.iter().filter(|f| f.is_partial_rebuild_date).count() > 1 {
            return Err(Error::Configuration(format!(
                "The document \"{}\" declares more than one partial rebuild date",
                document_type
            )));
        }

        // Without declared key fields, an `id` property is the key.
        let mut key_fields: Vec<FieldDescriptor> =
            self.fields.iter().filter(|f| f.is_key()).cloned().collect();
        if key_fields.is_empty() {
            if let Some(id) = self.fields.iter().find(|f| f.property_name == "id") {
                key_fields.push(id.clone());
            }
        }

        let primary_key = PrimaryKeyDescriptor::new(key_fields).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("Document \"{}\": {}", document_type, msg))
            }
            other => other,
        })?;

        Ok(DocumentDefinition {
            document_type,
            fields: self.fields,
            by_property,
            primary_key,
            security_field,
        })
    }
}
