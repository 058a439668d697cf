//! Facets: definitions, selections and the backend aggregations behind them

pub mod definition;
pub mod handler;

pub use definition::{FacetDefinition, FacetInput, FacetOrdering, MISSING_LABEL, MISSING_VALUE};
pub use handler::{FacetHandler, FACET_BUCKET_SIZE, MISSING_SUFFIX};
