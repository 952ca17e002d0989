//! Two-tier catalog output: a compact search index plus one detail document
//! per table

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{ColumnSpec, Layer, LineageSignals, TableEntry};
use super::store::Catalog;
use crate::error::CatalogError;

pub const SCHEMA_VERSION: u32 = 2;
pub const SEARCH_INDEX_FILE: &str = "catalog.search.json";
pub const DETAIL_DIR: &str = "catalog/full";

/// Compact projection of the whole catalog, scanned by search and lint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    pub schema_version: u32,
    pub root: String,
    pub generated_at: String,
    pub tables: Vec<SearchEntry>,
}

/// One table in the search index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub layer: Layer,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_comment: Option<String>,
    /// `(name, comment)` pairs; the comment is empty when unknown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddl_sql_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_file: Option<String>,
    pub detail_ref: String,
}

impl SearchEntry {
    /// `detail_ref` comes from the same allocation that names the detail
    /// document on disk
    pub fn from_entry(entry: &TableEntry, detail_ref: String) -> Self {
        Self {
            id: entry.id(),
            layer: entry.layer,
            name: entry.name.clone(),
            description: entry.description.clone(),
            table_comment: entry.table_comment.clone(),
            columns: entry
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.comment.clone().unwrap_or_default()))
                .collect(),
            partition_columns: entry
                .partition_columns
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            ddl_sql_file: entry.source_files.sql_files.first().cloned(),
            doc_file: entry.source_files.doc_files.first().cloned(),
            detail_ref,
        }
    }
}

/// Full record of one table, loaded on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailDoc {
    pub id: String,
    pub layer: Layer,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub sql_files: Vec<String>,
    #[serde(default)]
    pub doc_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<LineageSignals>,
}

impl DetailDoc {
    pub fn from_entry(entry: &TableEntry) -> Self {
        Self {
            id: entry.id(),
            layer: entry.layer,
            name: entry.name.clone(),
            description: entry.description.clone(),
            table_comment: entry.table_comment.clone(),
            columns: entry.columns.clone(),
            partition_columns: entry.partition_columns.clone(),
            sql_files: entry.source_files.sql_files.clone(),
            doc_files: entry.source_files.doc_files.clone(),
            signals: (!entry.signals.is_empty()).then(|| entry.signals.clone()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        read_json(path)
    }
}

/// Relative detail-document path for each entry, `/`-separated, in input
/// order.
///
/// Table names may carry path separators when they came from quoted
/// identifiers; those are replaced with `_`. Names that need no replacement
/// keep their own stem, and a replaced stem already taken within its layer
/// gets a `~N` suffix, so no two entries share a document.
pub fn detail_refs(entries: &[&TableEntry]) -> Vec<String> {
    let mut taken: HashSet<(Layer, String)> = entries
        .iter()
        .filter(|entry| detail_file_stem(&entry.name) == entry.name)
        .map(|entry| (entry.layer, entry.name.clone()))
        .collect();

    entries
        .iter()
        .map(|entry| {
            let base = detail_file_stem(&entry.name);
            let mut stem = base.clone();
            if base != entry.name {
                let mut n = 2;
                while !taken.insert((entry.layer, stem.clone())) {
                    stem = format!("{base}~{n}");
                    n += 1;
                }
            }
            format!("{}/{}/{}.json", DETAIL_DIR, entry.layer, stem)
        })
        .collect()
}

fn detail_file_stem(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

impl SearchIndex {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        read_json(path)
    }

    /// Write the index atomically
    pub fn write(&self, path: &Path, pretty: bool) -> Result<(), CatalogError> {
        write_json_atomic(path, self, pretty)
    }
}

impl Catalog {
    /// Project the retained entries into a search index
    pub fn build_search_index(&self, root: &str, include_unknown: bool) -> SearchIndex {
        let entries = self.retained(include_unknown);
        let refs = detail_refs(&entries);
        SearchIndex {
            schema_version: SCHEMA_VERSION,
            root: root.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            tables: entries
                .into_iter()
                .zip(refs)
                .map(|(entry, detail_ref)| SearchEntry::from_entry(entry, detail_ref))
                .collect(),
        }
    }

    /// Write one detail document per retained entry under
    /// `<out_root>/catalog/full/<LAYER>/`. Returns the number written.
    pub fn write_detail_docs(
        &self,
        out_root: &Path,
        include_unknown: bool,
        pretty: bool,
    ) -> Result<usize, CatalogError> {
        let entries = self.retained(include_unknown);
        for (entry, detail_ref) in entries.iter().zip(detail_refs(&entries)) {
            let path = out_root.join(detail_ref);
            write_json_atomic(&path, &DetailDoc::from_entry(entry), pretty)?;
        }
        debug!(count = entries.len(), "wrote detail documents");
        Ok(entries.len())
    }

    /// Write the search index and every detail document under `out_dir`.
    ///
    /// Returns the path of the search index.
    pub fn write_to(
        &self,
        out_dir: &Path,
        root: &str,
        include_unknown: bool,
        pretty: bool,
    ) -> Result<PathBuf, CatalogError> {
        fs::create_dir_all(out_dir).map_err(|source| CatalogError::io(out_dir, source))?;
        self.write_detail_docs(out_dir, include_unknown, pretty)?;
        let index_path = out_dir.join(SEARCH_INDEX_FILE);
        self.build_search_index(root, include_unknown)
            .write(&index_path, pretty)?;
        Ok(index_path)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::io(path, source))?;
    serde_json::from_str(&contents).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize to a temporary file next to `path`, then rename it into place.
///
/// A run killed mid-write leaves either the previous file or the new one,
/// never a truncated document.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), CatalogError> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| CatalogError::io(parent, source))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|source| CatalogError::io(parent, source))?;
    temp.write_all(&bytes)
        .map_err(|source| CatalogError::io(temp.path(), source))?;
    temp.persist(path)
        .map_err(|err| CatalogError::io(path, err.error))?;
    Ok(())
}
