// Integration tests for catalog builds
use std::fs;
use std::path::Path;

use dwscope_core::catalog::{DetailDoc, SCHEMA_VERSION, SEARCH_INDEX_FILE};
use dwscope_core::{BuildOptions, CatalogBuilder, Layer, SearchEntry, SearchIndex};
use pretty_assertions::assert_eq;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn build_index(root: &Path, out: &Path) -> SearchIndex {
    let catalog = CatalogBuilder::new(root).build().unwrap();
    let index_path = catalog.write_to(out, "warehouse", false, true).unwrap();
    SearchIndex::load(&index_path).unwrap()
}

#[test]
fn test_empty_tree_yields_empty_index() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let index = build_index(root.path(), out.path());
    assert_eq!(index.schema_version, SCHEMA_VERSION);
    assert_eq!(index.root, "warehouse");
    assert!(index.tables.is_empty());
    assert!(out.path().join(SEARCH_INDEX_FILE).is_file());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CatalogBuilder::new(dir.path().join("absent"))
        .build()
        .unwrap_err();
    assert!(err.is_user_error());
}

#[test]
fn test_end_to_end_search_entry() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "ADS/t1.sql",
        "CREATE TABLE ads.t1 (id INT COMMENT '主键') PARTITIONED BY (dt STRING)",
    );

    let index = build_index(root.path(), root.path());
    assert_eq!(
        index.tables,
        vec![SearchEntry {
            id: "ADS|ads.t1".to_string(),
            layer: Layer::Ads,
            name: "ads.t1".to_string(),
            description: None,
            table_comment: None,
            columns: vec![("id".to_string(), "主键".to_string())],
            partition_columns: vec!["dt".to_string()],
            ddl_sql_file: Some("ADS/t1.sql".to_string()),
            doc_file: None,
            detail_ref: "catalog/full/ADS/ads.t1.json".to_string(),
        }]
    );

    let detail = DetailDoc::load(&root.path().join(&index.tables[0].detail_ref)).unwrap();
    assert_eq!(detail.sql_files, vec!["ADS/t1.sql"]);
    assert_eq!(detail.partition_columns[0].name, "dt");
}

#[test]
fn test_rebuild_is_deterministic_except_timestamp() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "DWS/b.sql", "create table dws.b (k string comment '键')");
    write(root.path(), "DWS/a.sql", "insert overwrite table dws.b select k from ods.src");
    write(root.path(), "ODS/src.sql", "create table ods.src (k string)");
    write(root.path(), "DWS/dws.b.md", "# dws.b");

    let first = build_index(root.path(), &root.path().join("out1"));
    let second = build_index(root.path(), &root.path().join("out2"));
    assert_eq!(first.tables, second.tables);
    assert_eq!(first.tables.len(), 2);
}

#[test]
fn test_first_file_in_path_order_wins() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "DWD/b_late.sql", "CREATE TABLE dwd.t (late_col INT COMMENT 'late')");
    write(root.path(), "DWD/a_early.sql", "CREATE TABLE dwd.t (early_col INT COMMENT 'early')");

    let index = build_index(root.path(), root.path());
    assert_eq!(index.tables.len(), 1);
    let entry = &index.tables[0];
    assert_eq!(entry.columns, vec![("early_col".to_string(), "early".to_string())]);
    assert_eq!(entry.ddl_sql_file.as_deref(), Some("DWD/a_early.sql"));
}

#[test]
fn test_unknown_layer_is_opt_in() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "misc/orphan.sql", "CREATE TABLE orphan (id INT)");

    let builder = CatalogBuilder::with_options(
        root.path(),
        BuildOptions {
            include_unknown: true,
            ..Default::default()
        },
    );
    let catalog = builder.build().unwrap();
    assert_eq!(catalog.summary(false).skipped_unknown, 1);
    assert_eq!(catalog.summary(false).tables_indexed, 0);

    let kept = catalog.build_search_index("r", true);
    assert_eq!(kept.tables.len(), 1);
    assert_eq!(kept.tables[0].layer, Layer::Unknown);
}

#[test]
fn test_quoted_and_plain_names_get_separate_detail_documents() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "ADS/a.sql", "CREATE TABLE `x/y` (first_col INT)");
    write(root.path(), "ADS/b.sql", "CREATE TABLE x_y (second_col INT)");

    let index = build_index(root.path(), root.path());
    assert_eq!(index.tables.len(), 2);
    for table in &index.tables {
        let detail = DetailDoc::load(&root.path().join(&table.detail_ref)).unwrap();
        assert_eq!(detail.name, table.name);
        assert_eq!(detail.columns.len(), 1);
    }
    assert_eq!(index.tables[1].detail_ref, "catalog/full/ADS/x_y.json");
}
