//! In-memory table registry and its merge rules

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::model::{push_unique, ColumnSpec, Layer, LineageSignals, TableEntry};

/// Everything one source file contributes to each table it names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableContribution {
    /// Path of a SQL file, relative to the scan root
    pub sql_file: Option<String>,
    /// Path of a documentation file, relative to the scan root
    pub doc_file: Option<String>,
    pub description: Option<String>,
    pub table_comment: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub partition_columns: Vec<ColumnSpec>,
    pub signals: Option<LineageSignals>,
}

impl TableEntry {
    /// Fold one file's contribution into this entry.
    ///
    /// Field precedence:
    /// - `description`, `table_comment`: first non-empty value wins
    /// - `columns`, `partition_columns`: first non-empty list wins and is
    ///   never replaced
    /// - `sql_files`, `doc_files`: accumulate, de-duplicated, first-seen order
    /// - signals: lists accumulate de-duplicated, flags are OR-ed
    pub fn merge(&mut self, contribution: &TableContribution) {
        if self.table_comment.is_none() {
            self.table_comment = non_empty(&contribution.table_comment);
        }
        if self.description.is_none() {
            self.description = non_empty(&contribution.description);
        }

        if let Some(path) = &contribution.sql_file {
            push_unique(&mut self.source_files.sql_files, path);
        }
        if let Some(path) = &contribution.doc_file {
            push_unique(&mut self.source_files.doc_files, path);
        }

        if self.columns.is_empty() && !contribution.columns.is_empty() {
            self.columns = contribution.columns.clone();
        }
        if self.partition_columns.is_empty() && !contribution.partition_columns.is_empty() {
            self.partition_columns = contribution.partition_columns.clone();
        }

        if let Some(signals) = &contribution.signals {
            self.signals.absorb(signals);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Table registry for one build
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: IndexMap<(Layer, String), TableEntry>,
    /// Number of files merged into the catalog
    pub files_merged: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a contribution into the entry for `(layer, name)`, creating it
    /// on first sight
    pub fn merge(&mut self, layer: Layer, name: &str, contribution: &TableContribution) {
        self.tables
            .entry((layer, name.to_string()))
            .or_insert_with(|| TableEntry::new(layer, name))
            .merge(contribution);
    }

    /// Look up a table by key
    pub fn get(&self, layer: Layer, name: &str) -> Option<&TableEntry> {
        self.tables.get(&(layer, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All entries sorted by `(layer, name)`
    pub fn entries(&self) -> Vec<&TableEntry> {
        let mut entries: Vec<&TableEntry> = self.tables.values().collect();
        entries.sort_by(|a, b| (a.layer, &a.name).cmp(&(b.layer, &b.name)));
        entries
    }

    /// Sorted entries that are written out; UNKNOWN-layer entries are
    /// dropped unless `include_unknown` is set
    pub fn retained(&self, include_unknown: bool) -> Vec<&TableEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| include_unknown || entry.layer.is_known())
            .collect()
    }

    /// Statistics over the retained entries
    pub fn summary(&self, include_unknown: bool) -> BuildSummary {
        let retained = self.retained(include_unknown);
        let mut layer_counts = BTreeMap::new();
        for entry in &retained {
            *layer_counts.entry(entry.layer).or_insert(0) += 1;
        }
        let skipped_unknown = if include_unknown {
            0
        } else {
            self.tables
                .keys()
                .filter(|(layer, _)| !layer.is_known())
                .count()
        };
        let tables_with_column_comments = retained
            .iter()
            .filter(|entry| entry.columns.iter().any(|c| c.comment.is_some()))
            .count();

        BuildSummary {
            files_scanned: self.files_merged,
            tables_indexed: retained.len(),
            skipped_unknown,
            layer_counts,
            tables_with_column_comments,
        }
    }
}

/// Counts reported after a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub files_scanned: usize,
    pub tables_indexed: usize,
    pub skipped_unknown: usize,
    pub layer_counts: BTreeMap<Layer, usize>,
    pub tables_with_column_comments: usize,
}
