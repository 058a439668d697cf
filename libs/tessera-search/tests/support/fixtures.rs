//! Test documents, their table and loaders

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_search::descriptor::KeyValue;
use tessera_search::{
    DescriptorRegistry, DocumentDefinition, DocumentId, DocumentLoader, FieldCategory, FieldDescriptor,
    FieldType, Result, SearchDocument,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub status: Option<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchDocument for Company {
    const DOCUMENT_TYPE: &'static str = "Company";

    fn describe() -> Result<DocumentDefinition> {
        DocumentDefinition::builder(Self::DOCUMENT_TYPE)
            .field(FieldDescriptor::new("id", FieldType::Long, FieldCategory::Filter).key(1))
            .field(FieldDescriptor::new("name", FieldType::Text, FieldCategory::FullText).boost(2.0))
            .field(FieldDescriptor::new("status", FieldType::Keyword, FieldCategory::Facet))
            .field(FieldDescriptor::new("scope", FieldType::Keyword, FieldCategory::Security))
            .field(FieldDescriptor::new("tags", FieldType::Keyword, FieldCategory::Facet).multi_valued())
            .build()
    }
}

/// Link between a company and a person, keyed on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub company_id: i64,
    pub person_id: i64,
    pub role: String,
}

impl SearchDocument for Contact {
    const DOCUMENT_TYPE: &'static str = "Contact";

    fn describe() -> Result<DocumentDefinition> {
        DocumentDefinition::builder(Self::DOCUMENT_TYPE)
            .field(FieldDescriptor::new("company_id", FieldType::Long, FieldCategory::Filter).key(1))
            .field(FieldDescriptor::new("person_id", FieldType::Long, FieldCategory::Filter).key(2))
            .field(FieldDescriptor::new("role", FieldType::Keyword, FieldCategory::Facet))
            .build()
    }
}

pub fn company(id: i64, name: &str, status: &str) -> Company {
    Company {
        id,
        name: name.to_string(),
        status: Some(status.to_string()),
        scope: Some("EU".to_string()),
        tags: Vec::new(),
    }
}

/// Primary store rows, seen through the transaction connection.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub companies: BTreeMap<i64, Company>,
    pub contacts: BTreeMap<(i64, i64), Contact>,
}

impl Tables {
    pub fn seeded() -> Self {
        let mut tables = Self::default();
        for c in [
            company(1, "Acme", "ACT"),
            company(2, "Acme Labs", "CLO"),
            company(3, "Globex", "ACT"),
        ] {
            tables.companies.insert(c.id, c);
        }
        tables.contacts.insert(
            (1, 10),
            Contact {
                company_id: 1,
                person_id: 10,
                role: "owner".to_string(),
            },
        );
        tables
    }
}

fn int_key(value: Option<&KeyValue>) -> Option<i64> {
    match value {
        Some(KeyValue::Int(i)) => Some(*i),
        _ => None,
    }
}

pub struct CompanyLoader;

#[async_trait]
impl DocumentLoader<Company, Tables> for CompanyLoader {
    async fn get(&self, conn: &mut Tables, id: &DocumentId) -> Result<Option<Company>> {
        Ok(int_key(id.as_single()).and_then(|id| conn.companies.get(&id).cloned()))
    }

    async fn get_many(&self, conn: &mut Tables, ids: &[DocumentId]) -> Result<Vec<Company>> {
        Ok(ids
            .iter()
            .filter_map(|id| int_key(id.as_single()))
            .filter_map(|id| conn.companies.get(&id).cloned())
            .collect())
    }

    async fn get_all(&self, conn: &mut Tables, _partial_rebuild: bool) -> Result<Vec<Company>> {
        Ok(conn.companies.values().cloned().collect())
    }
}

pub struct ContactLoader;

fn contact_key(id: &DocumentId) -> Option<(i64, i64)> {
    match id {
        DocumentId::Composite(values) => match values.as_slice() {
            [Some(KeyValue::Int(a)), Some(KeyValue::Int(b))] => Some((*a, *b)),
            _ => None,
        },
        DocumentId::Single(_) => None,
    }
}

#[async_trait]
impl DocumentLoader<Contact, Tables> for ContactLoader {
    async fn get(&self, conn: &mut Tables, id: &DocumentId) -> Result<Option<Contact>> {
        Ok(contact_key(id).and_then(|key| conn.contacts.get(&key).cloned()))
    }

    async fn get_many(&self, conn: &mut Tables, ids: &[DocumentId]) -> Result<Vec<Contact>> {
        Ok(ids
            .iter()
            .filter_map(contact_key)
            .filter_map(|key| conn.contacts.get(&key).cloned())
            .collect())
    }

    async fn get_all(&self, conn: &mut Tables, _partial_rebuild: bool) -> Result<Vec<Contact>> {
        Ok(conn.contacts.values().cloned().collect())
    }
}

pub fn registry() -> Arc<DescriptorRegistry> {
    let registry = DescriptorRegistry::new()
        .register::<Company>()
        .and_then(|r| r.register::<Contact>())
        .expect("test documents describe themselves");
    Arc::new(registry)
}

pub fn company_loader() -> Arc<dyn DocumentLoader<Company, Tables>> {
    Arc::new(CompanyLoader)
}

pub fn contact_loader() -> Arc<dyn DocumentLoader<Contact, Tables>> {
    Arc::new(ContactLoader)
}
