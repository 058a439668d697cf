//! In-memory transaction host and search store

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tessera_search::store::{BulkMutator, SearchResponse, SearchStore};
use tessera_search::{DocumentDefinition, DocumentId, Error, Result, TransactionHost, TransactionScope};

use super::fixtures::Tables;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Scope events, in order.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

#[derive(Clone, Default)]
pub struct MemoryHost {
    pub tables: Tables,
    pub events: EventLog,
}

impl MemoryHost {
    pub fn seeded() -> Self {
        Self {
            tables: Tables::seeded(),
            events: EventLog::default(),
        }
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionHost for MemoryHost {
    type Scope = MemoryScope;

    async fn begin(&self) -> Result<MemoryScope> {
        self.events.lock().unwrap().push("begin");
        Ok(MemoryScope {
            tables: self.tables.clone(),
            events: Arc::clone(&self.events),
            nested: 0,
        })
    }
}

pub struct MemoryScope {
    pub tables: Tables,
    events: EventLog,
    nested: usize,
}

impl MemoryScope {
    fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl TransactionScope for MemoryScope {
    type Connection = Tables;

    fn connection(&mut self) -> Result<&mut Tables> {
        Ok(&mut self.tables)
    }

    async fn begin_nested(&mut self) -> Result<()> {
        self.nested += 1;
        self.record("begin_nested");
        Ok(())
    }

    async fn complete_nested(&mut self) -> Result<()> {
        if self.nested == 0 {
            return Err(Error::Transaction("No nested scope".to_string()));
        }
        self.nested -= 1;
        self.record("complete_nested");
        Ok(())
    }

    async fn abort_nested(&mut self) -> Result<()> {
        if self.nested == 0 {
            return Err(Error::Transaction("No nested scope".to_string()));
        }
        self.nested -= 1;
        self.record("abort_nested");
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.record("commit");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.record("rollback");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    Index { document_type: String, id: String },
    Delete { document_type: String, id: String },
}

#[derive(Debug, Clone)]
pub struct RecordedBulk {
    pub wait_for_refresh: bool,
    pub ops: Vec<BulkOp>,
    /// Mutator calls, as reported by `operation_count`.
    pub operations: usize,
}

#[derive(Debug, Clone)]
pub struct RecordedReset {
    pub document_type: String,
    pub documents: usize,
    pub partial_rebuild: bool,
}

#[derive(Default)]
struct StoreState {
    bulks: Vec<RecordedBulk>,
    fail_bulks: bool,
    indexes: BTreeSet<String>,
    resets: Vec<RecordedReset>,
    searches: Vec<JsonValue>,
    counts: Vec<JsonValue>,
    responses: VecDeque<SearchResponse>,
    pits: usize,
    count: u64,
}

/// Records everything sent to it; searches answer with queued responses.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn shared(&self) -> Arc<dyn SearchStore> {
        Arc::new(self.clone())
    }

    pub fn fail_bulks(&self) {
        self.state.lock().unwrap().fail_bulks = true;
    }

    pub fn push_response(&self, response: JsonValue) {
        let response = serde_json::from_value(response).expect("valid search response");
        self.state.lock().unwrap().responses.push_back(response);
    }

    pub fn set_count(&self, count: u64) {
        self.state.lock().unwrap().count = count;
    }

    pub fn bulks(&self) -> Vec<RecordedBulk> {
        self.state.lock().unwrap().bulks.clone()
    }

    pub fn resets(&self) -> Vec<RecordedReset> {
        self.state.lock().unwrap().resets.clone()
    }

    pub fn searches(&self) -> Vec<JsonValue> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn counts(&self) -> Vec<JsonValue> {
        self.state.lock().unwrap().counts.clone()
    }

    pub fn pits_opened(&self) -> usize {
        self.state.lock().unwrap().pits
    }
}

pub struct MemoryBulk<'a> {
    store: &'a MemoryStore,
    ops: Vec<BulkOp>,
    operations: usize,
}

impl MemoryBulk<'_> {
    fn push_index(&mut self, definition: &DocumentDefinition, document: &JsonValue) -> Result<()> {
        let id = definition.primary_key().key_from_document(document)?;
        self.ops.push(BulkOp::Index {
            document_type: definition.document_type().to_string(),
            id,
        });
        Ok(())
    }

    fn push_delete(&mut self, definition: &DocumentDefinition, id: &DocumentId) -> Result<()> {
        let id = definition.primary_key().key_from_id(id)?;
        self.ops.push(BulkOp::Delete {
            document_type: definition.document_type().to_string(),
            id,
        });
        Ok(())
    }
}

#[async_trait]
impl BulkMutator for MemoryBulk<'_> {
    fn delete(&mut self, definition: &DocumentDefinition, id: &DocumentId) -> Result<()> {
        self.push_delete(definition, id)?;
        self.operations += 1;
        Ok(())
    }

    fn delete_many(&mut self, definition: &DocumentDefinition, ids: &[DocumentId]) -> Result<()> {
        for id in ids {
            self.push_delete(definition, id)?;
        }
        self.operations += 1;
        Ok(())
    }

    fn index(&mut self, definition: &DocumentDefinition, document: &JsonValue) -> Result<()> {
        self.push_index(definition, document)?;
        self.operations += 1;
        Ok(())
    }

    fn index_many(&mut self, definition: &DocumentDefinition, documents: &[JsonValue]) -> Result<()> {
        for document in documents {
            self.push_index(definition, document)?;
        }
        self.operations += 1;
        Ok(())
    }

    fn operation_count(&self) -> usize {
        self.operations
    }

    async fn run(&mut self, wait_for_refresh: bool) -> Result<usize> {
        if self.operations == 0 {
            return Ok(0);
        }

        let mut state = self.store.state.lock().unwrap();
        if state.fail_bulks {
            return Err(Error::Backend("Bulk request failed for 1 item(s)".to_string()));
        }
        state.bulks.push(RecordedBulk {
            wait_for_refresh,
            ops: std::mem::take(&mut self.ops),
            operations: self.operations,
        });
        Ok(self.operations)
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    fn bulk(&self) -> Box<dyn BulkMutator + '_> {
        Box::new(MemoryBulk {
            store: self,
            ops: Vec::new(),
            operations: 0,
        })
    }

    async fn ensure_index(&self, definition: &DocumentDefinition) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.indexes.insert(definition.document_type().to_string()))
    }

    async fn reset_index(
        &self,
        definition: &DocumentDefinition,
        documents: Vec<JsonValue>,
        partial_rebuild: bool,
    ) -> Result<usize> {
        self.state.lock().unwrap().resets.push(RecordedReset {
            document_type: definition.document_type().to_string(),
            documents: documents.len(),
            partial_rebuild,
        });
        Ok(documents.len())
    }

    async fn search(&self, _definition: &DocumentDefinition, body: &JsonValue) -> Result<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(body.clone());
        Ok(state.responses.pop_front().unwrap_or_default())
    }

    async fn open_point_in_time(&self, _definition: &DocumentDefinition, _keep_alive: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.pits += 1;
        Ok(format!("pit-{}", state.pits))
    }

    async fn count(&self, _definition: &DocumentDefinition, body: &JsonValue) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.counts.push(body.clone());
        Ok(state.count)
    }
}
