//! Tessera Search - transactional indexing and advanced search
//!
//! Keeps an Elasticsearch index in sync with a primary store and queries it:
//! - Document descriptors mapping typed documents to backend fields
//! - Per-transaction indexing intents flushed as one bulk request at commit
//! - Full index rebuilds (full or partial)
//! - Advanced queries with criteria groups, filters, security scoping,
//!   multi-select facets, grouping and point-in-time paging

#![allow(
    clippy::type_complexity, // Boxed staging handles and loader trait objects
)]

pub mod config;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod facet;
pub mod indexing;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod query;
pub mod search;
pub mod store;

pub use config::Config;
pub use descriptor::{
    DescriptorRegistry, DocumentDefinition, DocumentId, FieldCategory, FieldDescriptor, FieldType,
    SearchDocument,
};
pub use error::{Error, Result};
pub use facet::{FacetDefinition, FacetInput, FacetOrdering};
pub use indexing::{
    run_in_transaction, DocumentLoader, IndexManager, SearchTransaction, TransactionHost,
    TransactionScope,
};
pub use models::{FacetItem, FacetOutput, GroupResult, QueryOutput};
pub use query::{AdvancedQueryInput, AdvancedQueryInputBuilder, Criteria, QueryCompiler, QueryInput};
pub use search::SearchService;
pub use store::{elastic::ElasticStore, SearchStore};
