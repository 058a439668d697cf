//! Advanced queries
//!
//! Request types, DSL fragments and the compiler producing backend request
//! bodies from them.

pub mod compiler;
pub mod cursor;
pub mod dsl;
pub mod input;

pub use compiler::{
    CompileOptions, CompiledQuery, GroupTarget, QueryCompiler, DEFAULT_PAGE_SIZE, GROUP_BUCKET_SIZE,
    GROUP_SUFFIX, TOP_HITS_NAME,
};
pub use cursor::{PageCursor, PIT_KEEP_ALIVE, PIT_PAGE_SIZE};
pub use input::{
    AdvancedQueryInput, AdvancedQueryInputBuilder, Criteria, CriteriaFilters, FilterValue, NoFilters,
    QueryInput, SkipToken, DEFAULT_GROUP_SIZE,
};
