use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;

use super::coordinator::IndexingCoordinator;
use super::loader::DocumentLoader;
use super::transaction::IndexingScope;
use crate::config::SearchConfig;
use crate::descriptor::{DescriptorRegistry, DocumentDefinition, DocumentId, SearchDocument};
use crate::metrics::REBUILDS_TOTAL;
use crate::store::SearchStore;
use crate::Result;

/// Entry point for indexing one document type.
///
/// Index and delete calls only register intents on the given unit of work;
/// they reach the backend when that unit of work commits.
pub struct IndexManager<D: SearchDocument, C: ?Sized + Send + 'static> {
    definition: Arc<DocumentDefinition>,
    loader: Arc<dyn DocumentLoader<D, C>>,
    wait_for_refresh: bool,
}

impl<D: SearchDocument, C: ?Sized + Send + 'static> Clone for IndexManager<D, C> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            loader: Arc::clone(&self.loader),
            wait_for_refresh: self.wait_for_refresh,
        }
    }
}

impl<D: SearchDocument, C: ?Sized + Send + 'static> IndexManager<D, C> {
    /// Manager with the default search settings: commits wait for refresh.
    pub fn new(registry: &DescriptorRegistry, loader: Arc<dyn DocumentLoader<D, C>>) -> Result<Self> {
        Self::from_config(registry, loader, &SearchConfig::default())
    }

    /// Manager whose refresh policy comes from `search.wait_for_refresh`.
    pub fn from_config(
        registry: &DescriptorRegistry,
        loader: Arc<dyn DocumentLoader<D, C>>,
        config: &SearchConfig,
    ) -> Result<Self> {
        Ok(Self {
            definition: registry.definition::<D>()?,
            loader,
            wait_for_refresh: config.wait_for_refresh,
        })
    }

    /// Whether commits wait for the indexed documents to become searchable.
    pub fn with_wait_for_refresh(mut self, wait_for_refresh: bool) -> Self {
        self.wait_for_refresh = wait_for_refresh;
        self
    }

    pub fn definition(&self) -> &Arc<DocumentDefinition> {
        &self.definition
    }

    fn coordinator<'a>(&self, tx: &'a mut impl IndexingScope<C>) -> &'a mut IndexingCoordinator<C> {
        let coordinator = tx.coordinator();
        coordinator.set_wait_for_refresh(self.wait_for_refresh);
        coordinator
    }

    pub fn index(&self, tx: &mut impl IndexingScope<C>, id: impl Into<DocumentId>) {
        let id = id.into();
        let state = self
            .coordinator(tx)
            .state_for::<D>(&self.definition, &self.loader);
        if !state.register_index(id.clone()) {
            tracing::trace!(document_type = D::DOCUMENT_TYPE, id = %id, "Index ignored, document is pending deletion");
        }
    }

    pub fn index_many<I>(&self, tx: &mut impl IndexingScope<C>, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<DocumentId>,
    {
        let state = self
            .coordinator(tx)
            .state_for::<D>(&self.definition, &self.loader);
        for id in ids {
            state.register_index(id.into());
        }
    }

    pub fn delete(&self, tx: &mut impl IndexingScope<C>, id: impl Into<DocumentId>) {
        self.coordinator(tx)
            .state_for::<D>(&self.definition, &self.loader)
            .register_delete(id.into());
    }

    pub fn delete_many<I>(&self, tx: &mut impl IndexingScope<C>, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<DocumentId>,
    {
        let state = self
            .coordinator(tx)
            .state_for::<D>(&self.definition, &self.loader);
        for id in ids {
            state.register_delete(id.into());
        }
    }

    /// Reindex every document of the type at commit, ignoring per-id intents.
    pub fn index_all(&self, tx: &mut impl IndexingScope<C>) {
        self.coordinator(tx)
            .state_for::<D>(&self.definition, &self.loader)
            .register_reindex_all();
    }

    /// Rebuild the backend index outside of any transaction.
    ///
    /// A freshly created index receives every document; an existing one gets
    /// a partial rebuild where the loader may skip unchanged documents.
    /// Online indexing running at the same time is not fenced off.
    pub async fn rebuild_index(&self, store: &dyn SearchStore, conn: &mut C) -> Result<usize> {
        let start = Instant::now();
        let created = store.ensure_index(&self.definition).await?;
        let partial_rebuild = !created;

        tracing::info!(
            document_type = D::DOCUMENT_TYPE,
            partial_rebuild,
            "Rebuilding search index"
        );

        let documents = self.loader.get_all(conn, partial_rebuild).await?;
        let documents = documents
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<JsonValue>, _>>()?;

        let count = store
            .reset_index(&self.definition, documents, partial_rebuild)
            .await?;

        REBUILDS_TOTAL
            .with_label_values(&[D::DOCUMENT_TYPE, if partial_rebuild { "partial" } else { "full" }])
            .inc();

        tracing::info!(
            document_type = D::DOCUMENT_TYPE,
            count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search index rebuilt"
        );

        Ok(count)
    }
}
