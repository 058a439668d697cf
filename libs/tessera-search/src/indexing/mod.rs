//! Transactional indexing
//!
//! Intents registered through an [`IndexManager`] are buffered per transaction
//! in an [`IndexingCoordinator`] and flushed as a single bulk request right
//! before the primary store commits.

pub mod coordinator;
pub mod loader;
pub mod manager;
pub mod state;
pub mod transaction;

pub use coordinator::{IndexingCoordinator, StageSummary, StagedIndexing};
pub use loader::DocumentLoader;
pub use manager::IndexManager;
pub use state::IndexingState;
pub use transaction::{
    run_in_transaction, IndexingScope, SearchTransaction, TransactionHost, TransactionScope,
};
