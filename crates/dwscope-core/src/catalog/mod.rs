//! Catalog management module

mod index;
mod model;
mod store;

pub use index::{
    detail_refs, DetailDoc, SearchEntry, SearchIndex, DETAIL_DIR, SCHEMA_VERSION,
    SEARCH_INDEX_FILE,
};
pub use model::{short_name, ColumnSpec, Layer, LineageSignals, SourceFiles, TableEntry};
pub use store::{BuildSummary, Catalog, TableContribution};
