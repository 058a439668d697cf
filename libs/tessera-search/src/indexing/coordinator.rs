//! Per-transaction indexing coordinator
//!
//! Collects intents per document type and turns them into a single bulk
//! request when the owning transaction commits.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::loader::DocumentLoader;
use super::state::IndexingState;
use crate::descriptor::{DocumentDefinition, DocumentId, SearchDocument};
use crate::metrics::INDEXING_OPERATIONS_TOTAL;
use crate::store::{BulkMutator, SearchStore};
use crate::{Error, Result};

/// Staged intents of one document type, type-erased so heterogeneous
/// document types share one coordinator.
#[async_trait]
pub trait StagedIndexing<C: ?Sized + Send>: Send {
    fn document_type(&self) -> &str;

    fn state(&self) -> &IndexingState;

    fn state_mut(&mut self) -> &mut IndexingState;

    /// Translate the pending intents into bulk operations.
    async fn stage(&mut self, conn: &mut C, bulk: &mut dyn BulkMutator) -> Result<StageSummary>;
}

/// Documents staged for one document type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub deleted: usize,
    pub indexed: usize,
}

struct TypedStaging<D: SearchDocument, C: ?Sized + Send> {
    definition: Arc<DocumentDefinition>,
    loader: Arc<dyn DocumentLoader<D, C>>,
    state: IndexingState,
    _document: PhantomData<fn() -> D>,
}

fn to_json<D: SearchDocument>(documents: &[D]) -> Result<Vec<JsonValue>> {
    documents
        .iter()
        .map(|d| serde_json::to_value(d).map_err(Error::from))
        .collect()
}

#[async_trait]
impl<D: SearchDocument, C: ?Sized + Send> StagedIndexing<C> for TypedStaging<D, C> {
    fn document_type(&self) -> &str {
        D::DOCUMENT_TYPE
    }

    fn state(&self) -> &IndexingState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IndexingState {
        &mut self.state
    }

    async fn stage(&mut self, conn: &mut C, bulk: &mut dyn BulkMutator) -> Result<StageSummary> {
        let definition = self.definition.as_ref();
        let mut summary = StageSummary::default();

        if self.state.reindex_all() {
            let documents = self.loader.get_all(conn, false).await?;
            if !documents.is_empty() {
                bulk.index_many(definition, &to_json(&documents)?)?;
                summary.indexed = documents.len();
            }
            return Ok(summary);
        }

        let to_delete: Vec<DocumentId> = self.state.ids_to_delete().iter().cloned().collect();
        match to_delete.as_slice() {
            [] => {}
            [id] => bulk.delete(definition, id)?,
            ids => bulk.delete_many(definition, ids)?,
        }
        summary.deleted = to_delete.len();

        let to_index: Vec<DocumentId> = self.state.ids_to_index().iter().cloned().collect();
        match to_index.as_slice() {
            [] => {}
            [id] => {
                // The source row may have been removed since the intent was registered.
                if let Some(document) = self.loader.get(conn, id).await? {
                    bulk.index(definition, &serde_json::to_value(&document)?)?;
                    summary.indexed = 1;
                }
            }
            ids => {
                let documents = self.loader.get_many(conn, ids).await?;
                if !documents.is_empty() {
                    bulk.index_many(definition, &to_json(&documents)?)?;
                    summary.indexed = documents.len();
                }
            }
        }

        Ok(summary)
    }
}

/// Indexing intents of one transaction, across document types.
pub struct IndexingCoordinator<C: ?Sized + Send> {
    entries: Vec<Box<dyn StagedIndexing<C>>>,
    wait_for_refresh: bool,
}

impl<C: ?Sized + Send + 'static> Default for IndexingCoordinator<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + Send + 'static> IndexingCoordinator<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            wait_for_refresh: true,
        }
    }

    /// State of a document type, created on first use. Types are flushed in
    /// the order they were first touched.
    pub fn state_for<D: SearchDocument>(
        &mut self,
        definition: &Arc<DocumentDefinition>,
        loader: &Arc<dyn DocumentLoader<D, C>>,
    ) -> &mut IndexingState {
        let position = self
            .entries
            .iter()
            .position(|e| e.document_type() == D::DOCUMENT_TYPE);

        let index = match position {
            Some(index) => index,
            None => {
                self.entries.push(Box::new(TypedStaging::<D, C> {
                    definition: Arc::clone(definition),
                    loader: Arc::clone(loader),
                    state: IndexingState::new(),
                    _document: PhantomData,
                }));
                self.entries.len() - 1
            }
        };

        self.entries[index].state_mut()
    }

    /// Pending state of a document type, if any intent was registered.
    pub fn state(&self, document_type: &str) -> Option<&IndexingState> {
        self.entries
            .iter()
            .find(|e| e.document_type() == document_type)
            .map(|e| e.state())
    }

    pub fn set_wait_for_refresh(&mut self, wait_for_refresh: bool) {
        self.wait_for_refresh = wait_for_refresh;
    }

    pub fn wait_for_refresh(&self) -> bool {
        self.wait_for_refresh
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| !e.state().is_empty())
    }

    /// Send every pending intent as one bulk request.
    ///
    /// On success all state is dropped and the number of bulk operations is
    /// returned. On failure the error is logged and returned untouched.
    pub async fn flush(&mut self, conn: &mut C, store: &dyn SearchStore) -> Result<usize> {
        if !self.has_pending() {
            self.entries.clear();
            return Ok(0);
        }

        let start = Instant::now();
        match self.run_bulk(conn, store).await {
            Ok(operations) => {
                tracing::debug!(
                    operations,
                    wait_for_refresh = self.wait_for_refresh,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Flushed indexing intents"
                );
                self.entries.clear();
                Ok(operations)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    document_types = ?self.entries.iter().map(|e| e.document_type().to_string()).collect::<Vec<_>>(),
                    "Failed to flush indexing intents"
                );
                Err(e)
            }
        }
    }

    async fn run_bulk(&mut self, conn: &mut C, store: &dyn SearchStore) -> Result<usize> {
        let mut bulk = store.bulk();

        for entry in self.entries.iter_mut() {
            let summary = entry.stage(conn, bulk.as_mut()).await?;
            if summary.indexed > 0 {
                INDEXING_OPERATIONS_TOTAL
                    .with_label_values(&[entry.document_type(), "index"])
                    .inc_by(summary.indexed as u64);
            }
            if summary.deleted > 0 {
                INDEXING_OPERATIONS_TOTAL
                    .with_label_values(&[entry.document_type(), "delete"])
                    .inc_by(summary.deleted as u64);
            }
        }

        bulk.run(self.wait_for_refresh).await
    }
}
