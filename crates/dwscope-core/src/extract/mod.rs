//! DDL Extractor: per-file structure recovery and the directory build driver

mod builder;
pub mod ddl;
pub mod layer;
pub mod lineage;

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};

use tracing::{debug, warn};

use crate::catalog::{Layer, LineageSignals};
use crate::scanner::strip_comments;

pub use builder::{BuildOptions, CatalogBuilder, DEFAULT_MAX_BYTES, DEFAULT_SUFFIXES};
pub use ddl::CreateTable;
pub use layer::detect_layer;

/// What a single SQL text declares and how its data flows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlShape {
    /// Every `CREATE TABLE` name, in order
    pub create_names: Vec<String>,
    /// Structure of the first `CREATE TABLE`
    pub table: Option<CreateTable>,
    pub signals: LineageSignals,
}

/// Recover the shape of one SQL text. Comments are removed first, so
/// commented-out DDL never contributes.
pub fn analyze_sql(text: &str) -> SqlShape {
    let sql = strip_comments(text);
    SqlShape {
        create_names: ddl::find_create_table_names(&sql),
        table: ddl::parse_create_table(&sql),
        signals: lineage::extract_signals(&sql),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Sql,
    Doc,
}

/// Everything extracted from one file, before merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtract {
    /// Path relative to the scan root, `/`-separated
    pub rel_path: String,
    pub stem: String,
    pub layer: Layer,
    pub kind: FileKind,
    pub description: Option<String>,
    /// `None` for documentation files and unreadable SQL files
    pub sql: Option<SqlShape>,
}

/// Extract one file. Never fails: an unreadable SQL file degrades to a
/// stub with no shape.
pub fn extract_file(root: &Path, path: &Path, max_bytes: u64) -> FileExtract {
    let kind = if has_sql_extension(path) {
        FileKind::Sql
    } else {
        FileKind::Doc
    };

    let sql = match kind {
        FileKind::Doc => None,
        FileKind::Sql => match read_text_limited(path, max_bytes) {
            Ok(text) => Some(analyze_sql(&text)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable sql file, indexing as stub");
                None
            }
        },
    };
    if let Some(shape) = &sql {
        if shape.create_names.is_empty() && shape.signals.insert_targets.is_empty() {
            debug!(path = %path.display(), "no recognized statements");
        }
    }

    FileExtract {
        rel_path: relative_path(root, path),
        stem: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        layer: detect_layer(root, path),
        kind,
        description: ddl::description_from_filename(path),
        sql,
    }
}

fn has_sql_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

/// Read at most `max_bytes`; invalid UTF-8 (including a character cut by
/// the limit) is replaced rather than rejected.
fn read_text_limited(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut buf = Vec::new();
    File::open(path)?.take(max_bytes).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_analyze_sql_ignores_commented_ddl() {
        let shape = analyze_sql(
            "-- CREATE TABLE old_t (x INT);\n\
             /* create table older (y int) */\n\
             CREATE TABLE dws.t (id INT COMMENT 'k');",
        );
        assert_eq!(shape.create_names, vec!["dws.t"]);
        assert_eq!(shape.table.map(|t| t.columns.len()), Some(1));
    }

    #[test]
    fn test_extract_file_sql() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("05-应用-ADS");
        fs::create_dir_all(&sub).unwrap();
        let path = sub.join("高校信息-ads_school.sql");
        fs::write(&path, "CREATE TABLE ads.school (id INT);").unwrap();

        let extract = extract_file(dir.path(), &path, 1_000);
        assert_eq!(extract.rel_path, "05-应用-ADS/高校信息-ads_school.sql");
        assert_eq!(extract.stem, "高校信息-ads_school");
        assert_eq!(extract.layer, Layer::Ads);
        assert_eq!(extract.kind, FileKind::Sql);
        assert_eq!(extract.description.as_deref(), Some("高校信息"));
        assert_eq!(extract.sql.unwrap().create_names, vec!["ads.school"]);
    }

    #[test]
    fn test_extract_file_truncates_and_tolerates_bad_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.SQL");
        let mut bytes = b"CREATE TABLE t (a INT); \xff\xfe ".to_vec();
        bytes.extend(b"CREATE TABLE late (b INT);");
        fs::write(&path, bytes).unwrap();

        let extract = extract_file(dir.path(), &path, 30);
        assert_eq!(extract.kind, FileKind::Sql);
        assert_eq!(extract.sql.unwrap().create_names, vec!["t"]);
    }

    #[test]
    fn test_extract_file_doc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.md");
        fs::write(&path, "# CREATE TABLE ignored (a INT)").unwrap();

        let extract = extract_file(dir.path(), &path, 1_000);
        assert_eq!(extract.kind, FileKind::Doc);
        assert!(extract.sql.is_none());
        assert_eq!(extract.description, None);
    }
}
