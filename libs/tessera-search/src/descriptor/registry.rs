use std::collections::HashMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::definition::DocumentDefinition;
use crate::{Error, Result};

/// A document type that can be indexed and searched.
///
/// Documents serialize to the JSON stored in the backend; field descriptors
/// refer to the serialized (camelCase) names.
pub trait SearchDocument: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable document type name, also used to name the backend index.
    const DOCUMENT_TYPE: &'static str;

    fn describe() -> Result<DocumentDefinition>;
}

/// Process-wide descriptor table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    definitions: HashMap<&'static str, Arc<DocumentDefinition>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<D: SearchDocument>(mut self) -> Result<Self> {
        let definition = D::describe()?;
        if definition.document_type() != D::DOCUMENT_TYPE {
            return Err(Error::Configuration(format!(
                "Document type \"{}\" describes itself as \"{}\"",
                D::DOCUMENT_TYPE,
                definition.document_type()
            )));
        }

        if self
            .definitions
            .insert(D::DOCUMENT_TYPE, Arc::new(definition))
            .is_some()
        {
            return Err(Error::Configuration(format!(
                "Document type \"{}\" is registered twice",
                D::DOCUMENT_TYPE
            )));
        }

        tracing::debug!(document_type = D::DOCUMENT_TYPE, "Registered search document");
        Ok(self)
    }

    pub fn definition<D: SearchDocument>(&self) -> Result<Arc<DocumentDefinition>> {
        self.get(D::DOCUMENT_TYPE).ok_or_else(|| {
            Error::Configuration(format!(
                "Document type \"{}\" is not registered",
                D::DOCUMENT_TYPE
            ))
        })
    }

    pub fn get(&self, document_type: &str) -> Option<Arc<DocumentDefinition>> {
        self.definitions.get(document_type).cloned()
    }

    pub fn document_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.definitions.keys().copied()
    }
}
