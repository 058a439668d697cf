use async_trait::async_trait;

use crate::descriptor::{DocumentId, SearchDocument};
use crate::Result;

/// Loads documents of one type from the primary store.
///
/// Every method receives the connection of the transaction being committed,
/// so rows written earlier in that transaction are visible.
#[async_trait]
pub trait DocumentLoader<D: SearchDocument, C: ?Sized + Send>: Send + Sync {
    /// `None` when the source row no longer exists.
    async fn get(&self, conn: &mut C, id: &DocumentId) -> Result<Option<D>>;

    async fn get_many(&self, conn: &mut C, ids: &[DocumentId]) -> Result<Vec<D>>;

    /// All documents of the type. With `partial_rebuild` set the loader may
    /// skip documents the index already holds in their current state.
    async fn get_all(&self, conn: &mut C, partial_rebuild: bool) -> Result<Vec<D>>;
}
