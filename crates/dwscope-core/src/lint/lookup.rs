//! Partition metadata lookup for the linter

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::catalog::{short_name, SearchIndex};

/// A catalog table as the linter sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub id: String,
    pub name: String,
    pub partition_columns: Vec<String>,
}

/// Table name to partition columns, keyed by full and by short name
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    entries: Vec<LookupEntry>,
    by_name: HashMap<String, usize>,
}

impl CatalogLookup {
    /// Full names map to the last entry carrying them; short names to the
    /// first.
    pub fn from_index(index: &SearchIndex) -> Self {
        let mut lookup = Self::default();
        for table in &index.tables {
            if table.name.is_empty() {
                continue;
            }
            let slot = lookup.entries.len();
            lookup.entries.push(LookupEntry {
                id: table.id.clone(),
                name: table.name.clone(),
                partition_columns: table.partition_columns.clone(),
            });
            lookup.by_name.insert(table.name.clone(), slot);
            lookup
                .by_name
                .entry(short_name(&table.name).to_string())
                .or_insert(slot);
        }
        lookup
    }

    /// Load a search index for linting. An unreadable or invalid file
    /// disables the partition checks instead of failing the run.
    pub fn load(path: &Path) -> Option<Self> {
        match SearchIndex::load(path) {
            Ok(index) => Some(Self::from_index(&index)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "catalog unavailable, partition checks disabled");
                None
            }
        }
    }

    /// Resolve a referenced table by full name, then by its last segment
    pub fn get(&self, name: &str) -> Option<&LookupEntry> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(short_name(name)))
            .map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
