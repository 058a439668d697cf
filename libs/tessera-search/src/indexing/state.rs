use std::collections::BTreeSet;

use crate::descriptor::DocumentId;

/// Pending index/delete intents of one document type within a transaction.
///
/// A delete always wins over an index for the same id, whichever was
/// registered first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingState {
    ids_to_delete: BTreeSet<DocumentId>,
    ids_to_index: BTreeSet<DocumentId>,
    reindex_all: bool,
}

impl IndexingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the id is already pending deletion.
    pub fn register_index(&mut self, id: DocumentId) -> bool {
        if self.ids_to_delete.contains(&id) {
            return false;
        }
        self.ids_to_index.insert(id);
        true
    }

    pub fn register_delete(&mut self, id: DocumentId) {
        self.ids_to_index.remove(&id);
        self.ids_to_delete.insert(id);
    }

    pub fn register_reindex_all(&mut self) {
        self.reindex_all = true;
    }

    pub fn ids_to_delete(&self) -> &BTreeSet<DocumentId> {
        &self.ids_to_delete
    }

    pub fn ids_to_index(&self) -> &BTreeSet<DocumentId> {
        &self.ids_to_index
    }

    pub fn reindex_all(&self) -> bool {
        self.reindex_all
    }

    pub fn is_empty(&self) -> bool {
        !self.reindex_all && self.ids_to_delete.is_empty() && self.ids_to_index.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids_to_delete.clear();
        self.ids_to_index.clear();
        self.reindex_all = false;
    }
}
