//! Search backend abstraction
//!
//! `SearchStore` covers index lifecycle and query execution, `BulkMutator`
//! accumulates index/delete actions that are sent in one request.

pub mod elastic;
pub mod response;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::descriptor::{DocumentDefinition, DocumentId};
use crate::Result;

pub use response::{Hit, Hits, SearchResponse, TotalHits};

/// Buffered bulk request against the search backend.
///
/// Operations are only recorded until `run` sends them. Each call counts as
/// one operation, whatever the number of documents it carries.
#[async_trait]
pub trait BulkMutator: Send {
    fn delete(&mut self, definition: &DocumentDefinition, id: &DocumentId) -> Result<()>;

    fn delete_many(&mut self, definition: &DocumentDefinition, ids: &[DocumentId]) -> Result<()>;

    fn index(&mut self, definition: &DocumentDefinition, document: &JsonValue) -> Result<()>;

    fn index_many(&mut self, definition: &DocumentDefinition, documents: &[JsonValue]) -> Result<()>;

    fn operation_count(&self) -> usize;

    /// Send all recorded operations. Nothing is sent when there are none.
    ///
    /// Returns the number of operations submitted.
    async fn run(&mut self, wait_for_refresh: bool) -> Result<usize>;
}

#[async_trait]
pub trait SearchStore: Send + Sync {
    fn bulk(&self) -> Box<dyn BulkMutator + '_>;

    /// Create the index for a document type if it does not exist.
    ///
    /// Returns `true` when the index was created by this call.
    async fn ensure_index(&self, definition: &DocumentDefinition) -> Result<bool>;

    /// Load a full document set into the index.
    ///
    /// A partial rebuild only upserts the given documents; otherwise existing
    /// documents are removed first. Returns the number of documents written.
    async fn reset_index(
        &self,
        definition: &DocumentDefinition,
        documents: Vec<JsonValue>,
        partial_rebuild: bool,
    ) -> Result<usize>;

    async fn search(&self, definition: &DocumentDefinition, body: &JsonValue) -> Result<SearchResponse>;

    async fn open_point_in_time(&self, definition: &DocumentDefinition, keep_alive: &str) -> Result<String>;

    async fn count(&self, definition: &DocumentDefinition, body: &JsonValue) -> Result<u64>;
}
