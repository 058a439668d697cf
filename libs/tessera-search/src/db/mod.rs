//! Primary store integration

pub mod transaction;

pub use transaction::{PgTransactionHost, PgTransactionScope};
