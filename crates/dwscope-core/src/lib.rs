//! dwscope-core: data-warehouse catalog extraction and static query linting
//!
//! This library indexes a tree of warehouse DDL and documentation files into
//! a searchable catalog, ranks catalog tables for free-text queries, and
//! lints candidate SQL against that catalog and a set of dialect rules. No
//! database connection or SQL grammar is involved: structure is recovered
//! with the quote- and parenthesis-aware primitives in [`scanner`].

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod extract;
pub mod lint;
pub mod scanner;
pub mod search;

pub use catalog::{BuildSummary, Catalog, DetailDoc, Layer, SearchEntry, SearchIndex, TableEntry};
pub use dialect::SqlDialect;
pub use error::{CatalogError, Finding, FindingKind, Severity};
pub use extract::{BuildOptions, CatalogBuilder};
pub use lint::{CatalogLookup, LintConfig, Linter};
pub use search::{SearchEngine, SearchQuery, Vocabulary};
