//! Transaction integration
//!
//! A `SearchTransaction` pairs a primary-store transaction with the indexing
//! intents raised inside it. Committing flushes the intents through one bulk
//! request before the store transaction commits; a failed flush rolls the
//! store transaction back.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::coordinator::IndexingCoordinator;
use crate::store::SearchStore;
use crate::Result;

/// Source of primary-store transactions.
#[async_trait]
pub trait TransactionHost: Send + Sync {
    type Scope: TransactionScope;

    async fn begin(&self) -> Result<Self::Scope>;
}

/// An open primary-store transaction.
#[async_trait]
pub trait TransactionScope: Send {
    /// Handle given to document loaders.
    type Connection: ?Sized + Send + 'static;

    fn connection(&mut self) -> Result<&mut Self::Connection>;

    /// Open a nested scope (savepoint) inside this transaction.
    async fn begin_nested(&mut self) -> Result<()>;

    async fn complete_nested(&mut self) -> Result<()>;

    async fn abort_nested(&mut self) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

mod sealed {
    pub trait Sealed {}
}

/// A unit of work whose indexing intents are flushed when it commits.
///
/// Only [`SearchTransaction`] implements it, so intents can never be
/// registered outside a transaction:
///
/// ```compile_fail
/// use tessera_search::indexing::{IndexingCoordinator, IndexingScope};
///
/// fn register(_: &mut impl IndexingScope<()>) {}
///
/// register(&mut IndexingCoordinator::<()>::new());
/// ```
pub trait IndexingScope<C: ?Sized + Send + 'static>: sealed::Sealed {
    fn coordinator(&mut self) -> &mut IndexingCoordinator<C>;
}

pub struct SearchTransaction<S: TransactionScope> {
    scope: S,
    indexing: IndexingCoordinator<S::Connection>,
    store: Arc<dyn SearchStore>,
}

impl<S: TransactionScope> SearchTransaction<S> {
    /// Begin a new store transaction.
    pub async fn begin<H>(host: &H, store: Arc<dyn SearchStore>) -> Result<Self>
    where
        H: TransactionHost<Scope = S>,
    {
        let scope = host.begin().await?;
        Ok(Self::join(scope, store))
    }

    /// Attach indexing to a transaction the caller already opened.
    pub fn join(scope: S, store: Arc<dyn SearchStore>) -> Self {
        Self {
            scope,
            indexing: IndexingCoordinator::new(),
            store,
        }
    }

    pub fn connection(&mut self) -> Result<&mut S::Connection> {
        self.scope.connection()
    }

    pub fn indexing(&mut self) -> &mut IndexingCoordinator<S::Connection> {
        &mut self.indexing
    }

    pub fn scope_mut(&mut self) -> &mut S {
        &mut self.scope
    }

    /// Flush pending intents, then commit the store transaction.
    pub async fn commit(self) -> Result<()> {
        let Self {
            mut scope,
            mut indexing,
            store,
        } = self;

        if indexing.has_pending() {
            scope.begin_nested().await?;

            let flushed = match scope.connection() {
                Ok(conn) => indexing.flush(conn, store.as_ref()).await,
                Err(e) => Err(e),
            };

            match flushed {
                Ok(_) => scope.complete_nested().await?,
                Err(e) => {
                    if let Err(abort_err) = scope.abort_nested().await {
                        tracing::warn!(error = %abort_err, "Failed to abort nested scope after indexing failure");
                    }
                    if let Err(rollback_err) = scope.rollback().await {
                        tracing::warn!(error = %rollback_err, "Failed to roll back transaction after indexing failure");
                    }
                    return Err(e);
                }
            }
        }

        scope.commit().await
    }

    /// Discard pending intents and roll back the store transaction.
    pub async fn rollback(self) -> Result<()> {
        if self.indexing.has_pending() {
            tracing::debug!("Discarding indexing intents of rolled back transaction");
        }
        self.scope.rollback().await
    }
}

impl<S: TransactionScope> sealed::Sealed for SearchTransaction<S> {}

impl<S: TransactionScope> IndexingScope<S::Connection> for SearchTransaction<S> {
    fn coordinator(&mut self) -> &mut IndexingCoordinator<S::Connection> {
        &mut self.indexing
    }
}

/// Run `f` in a new transaction, committing on success and rolling back on error.
pub async fn run_in_transaction<H, T, F>(host: &H, store: Arc<dyn SearchStore>, f: F) -> Result<T>
where
    H: TransactionHost,
    T: Send,
    F: for<'t> FnOnce(&'t mut SearchTransaction<H::Scope>) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = SearchTransaction::begin(host, store).await?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}
