//! Directory build driver: discover, extract in parallel, merge in order

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{extract_file, FileExtract, FileKind};
use crate::catalog::{short_name, Catalog, Layer, TableContribution};
use crate::error::CatalogError;

/// Default per-file read limit in bytes
pub const DEFAULT_MAX_BYTES: u64 = 2_000_000;
/// Default file suffix allow-list
pub const DEFAULT_SUFFIXES: [&str; 4] = [".sql", ".md", ".markdown", ".txt"];

/// Options for one catalog build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub max_bytes: u64,
    /// Allowed suffixes, lowercase with a leading dot
    pub suffixes: Vec<String>,
    /// Keep UNKNOWN-layer entries in the written catalog
    pub include_unknown: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            include_unknown: false,
        }
    }
}

impl BuildOptions {
    /// Replace the suffix list. Matching is case-insensitive and the leading
    /// dot is optional.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.suffixes = suffixes
            .into_iter()
            .map(|s| normalize_suffix(s.as_ref()))
            .filter(|s| s.len() > 1)
            .collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let suffix = normalize_suffix(ext);
        self.suffixes.iter().any(|allowed| *allowed == suffix)
    }
}

fn normalize_suffix(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

/// Builds a [`Catalog`] from a directory tree
pub struct CatalogBuilder {
    root: PathBuf,
    options: BuildOptions,
}

impl CatalogBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, BuildOptions::default())
    }

    pub fn with_options(root: impl Into<PathBuf>, options: BuildOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// All files under the root with an allowed suffix, sorted by path.
    ///
    /// Fails only when the root itself is missing or not a directory;
    /// unreadable entries below it are skipped with a warning.
    pub fn discover(&self) -> Result<Vec<PathBuf>, CatalogError> {
        self.check_root()?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.options.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        debug!(root = %self.root.display(), count = files.len(), "discovered files");
        Ok(files)
    }

    /// Run the whole build.
    ///
    /// Files are extracted in parallel but merged strictly in sorted-path
    /// order, so first-wins outcomes never depend on thread scheduling.
    pub fn build(&self) -> Result<Catalog, CatalogError> {
        let files = self.discover()?;
        let extracts: Vec<FileExtract> = files
            .par_iter()
            .map(|path| extract_file(&self.root, path, self.options.max_bytes))
            .collect();

        let mut merger = Merger::default();
        for extract in &extracts {
            merger.merge(extract);
        }
        let mut catalog = merger.catalog;
        catalog.files_merged = extracts.len();

        info!(files = extracts.len(), tables = catalog.len(), "catalog built");
        Ok(catalog)
    }

    fn check_root(&self) -> Result<(), CatalogError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CatalogError::NotADirectory {
                path: self.root.clone(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::RootNotFound {
                    path: self.root.clone(),
                })
            }
            Err(err) => Err(CatalogError::io(&self.root, err)),
        }
    }
}

/// Sequential merge state: the catalog plus the same-layer
/// `short name -> qualified name` map used to resolve bare insert targets.
#[derive(Default)]
struct Merger {
    catalog: Catalog,
    qualified: HashMap<(Layer, String), String>,
}

impl Merger {
    fn merge(&mut self, extract: &FileExtract) {
        match extract.kind {
            FileKind::Doc => {
                let contribution = TableContribution {
                    doc_file: Some(extract.rel_path.clone()),
                    description: extract.description.clone(),
                    ..Default::default()
                };
                self.catalog.merge(extract.layer, &extract.stem, &contribution);
            }
            FileKind::Sql => self.merge_sql(extract),
        }
    }

    fn merge_sql(&mut self, extract: &FileExtract) {
        let layer = extract.layer;
        let shape = extract.sql.clone().unwrap_or_default();

        for name in &shape.create_names {
            self.qualified
                .insert((layer, short_name(name).to_string()), name.clone());
        }

        let mut signals = shape.signals;
        signals.insert_targets = signals
            .insert_targets
            .iter()
            .map(|target| self.resolve(layer, target))
            .collect();

        let mut names: Vec<String> = Vec::new();
        let candidates = if !shape.create_names.is_empty() {
            &shape.create_names
        } else {
            &signals.insert_targets
        };
        for name in candidates {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        if names.is_empty() {
            names.push(extract.stem.clone());
        }

        for name in &names {
            let mut contribution = TableContribution {
                sql_file: Some(extract.rel_path.clone()),
                description: extract.description.clone(),
                signals: Some(signals.clone()),
                ..Default::default()
            };
            if let Some(table) = shape.table.as_ref().filter(|t| t.name == *name) {
                contribution.columns = table.columns.clone();
                contribution.partition_columns = table.partition_columns.clone();
                contribution.table_comment = table.table_comment.clone();
                if let Some(existing) = self.catalog.get(layer, name) {
                    if !existing.columns.is_empty()
                        && !table.columns.is_empty()
                        && existing.columns != table.columns
                    {
                        debug!(
                            table = %name,
                            file = %extract.rel_path,
                            "conflicting column list ignored, first declaration kept"
                        );
                    }
                }
            }
            self.catalog.merge(layer, name, &contribution);
        }
    }

    /// Qualify a bare insert target with a same-layer table seen so far
    fn resolve(&self, layer: Layer, target: &str) -> String {
        if target.contains('.') {
            return target.to_string();
        }
        self.qualified
            .get(&(layer, target.to_string()))
            .cloned()
            .unwrap_or_else(|| target.to_string())
    }
}
