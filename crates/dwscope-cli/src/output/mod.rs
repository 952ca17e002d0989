//! Output formatting

use std::path::{Path, PathBuf};

use dwscope_core::search::SearchResults;
use dwscope_core::{BuildSummary, Finding, Severity};

use crate::args::OutputFormat;

/// Columns listed per hit in human output
const MAX_LISTED_COLUMNS: usize = 10;

/// Output formatter for lint findings
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print findings in the configured format
    pub fn print_findings(&self, findings: &[Finding]) {
        match self.format {
            OutputFormat::Human => self.print_human(findings),
            OutputFormat::Json => self.print_json(findings),
            OutputFormat::Sarif => self.print_sarif(findings),
        }
    }

    fn print_human(&self, findings: &[Finding]) {
        if findings.is_empty() {
            println!("OK: no findings");
            return;
        }

        for finding in findings {
            let severity_str = match finding.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
                Severity::Info => "\x1b[34minfo\x1b[0m",
            };

            println!("{}[{}]: {}", severity_str, finding.code(), finding.message);
            println!("  --> {}", self.file_name);

            if let Some(help) = &finding.help {
                println!("   = help: {}", help);
            }

            println!();
        }
    }

    fn print_json(&self, findings: &[Finding]) {
        let output = serde_json::json!({
            "file": self.file_name,
            "ok": findings.is_empty(),
            "findings": findings
        });
        print_pretty(&output);
    }

    fn print_sarif(&self, findings: &[Finding]) {
        let results: Vec<serde_json::Value> = findings
            .iter()
            .map(|f| {
                let mut text = f.message.clone();
                if let Some(help) = &f.help {
                    text = format!("{} ({})", text, help);
                }
                serde_json::json!({
                    "ruleId": f.code(),
                    "level": match f.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                        Severity::Info => "note",
                    },
                    "message": {
                        "text": text
                    },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": {
                                "uri": self.file_name
                            }
                        }
                    }]
                })
            })
            .collect();

        let sarif = serde_json::json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "dwscope",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": results
            }]
        });

        print_pretty(&sarif);
    }
}

/// Print ranked search hits. `catalog_path` locates detail documents, which
/// are resolved relative to the directory holding the search index.
pub fn print_search_results(format: OutputFormat, results: &SearchResults<'_>, catalog_path: &Path) {
    match format {
        OutputFormat::Json => print_pretty(results),
        OutputFormat::Human | OutputFormat::Sarif => {
            print!("{}", render_search_human(results, catalog_path))
        }
    }
}

fn render_search_human(results: &SearchResults<'_>, catalog_path: &Path) -> String {
    if results.hits.is_empty() {
        return format!("No tables matched: {}\n", results.tokens.join(" "));
    }

    let base = catalog_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut out = String::new();
    for hit in &results.hits {
        let entry = hit.entry;
        out.push_str(&format!("[{:.1}] {} {}", hit.score, entry.layer, entry.name));
        if let Some(desc) = &entry.description {
            out.push_str(&format!(" ({})", desc));
        }
        out.push('\n');

        if let Some(comment) = &entry.table_comment {
            out.push_str(&format!("  COMMENT: {}\n", comment));
        }
        if let Some(sql) = &entry.ddl_sql_file {
            out.push_str(&format!("  SQL: {}\n", sql));
        }
        if let Some(doc) = &entry.doc_file {
            out.push_str(&format!("  DOC: {}\n", doc));
        }
        if !entry.columns.is_empty() {
            let listed: Vec<String> = entry
                .columns
                .iter()
                .take(MAX_LISTED_COLUMNS)
                .map(|(name, comment)| {
                    if comment.is_empty() {
                        name.clone()
                    } else {
                        format!("{}({})", name, comment)
                    }
                })
                .collect();
            out.push_str(&format!("  COLS: {}", listed.join(", ")));
            if entry.columns.len() > MAX_LISTED_COLUMNS {
                out.push_str(&format!(" +{}", entry.columns.len() - MAX_LISTED_COLUMNS));
            }
            out.push('\n');
        }
        if !entry.partition_columns.is_empty() {
            out.push_str(&format!("  PART: {}\n", entry.partition_columns.join(", ")));
        }
        let detail: PathBuf = base.join(&entry.detail_ref);
        if detail.is_file() {
            out.push_str(&format!("  DETAIL: {}\n", detail.display()));
        }
    }

    if results.total > results.hits.len() {
        out.push_str(&format!(
            "\nShowing {} of {} matches\n",
            results.hits.len(),
            results.total
        ));
    }
    out
}

/// Print the counts of a finished build
pub fn print_build_summary(summary: &BuildSummary, index_path: &Path) {
    eprintln!("Wrote {}", index_path.display());
    eprintln!(
        "Indexed {} table(s) from {} file(s)",
        summary.tables_indexed, summary.files_scanned
    );
    for (layer, count) in &summary.layer_counts {
        eprintln!("  {:<8} {}", layer.as_str(), count);
    }
    if summary.skipped_unknown > 0 {
        eprintln!(
            "Skipped {} table(s) with no detectable layer (use --include-unknown to keep them)",
            summary.skipped_unknown
        );
    }
    eprintln!(
        "{} table(s) carry column comments",
        summary.tables_with_column_comments
    );
}

fn print_pretty<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("Error: failed to serialize output: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwscope_core::search::ScoredEntry;
    use dwscope_core::{Layer, SearchEntry};

    fn entry(columns: usize) -> SearchEntry {
        SearchEntry {
            id: "ADS|ads.t1".to_string(),
            layer: Layer::Ads,
            name: "ads.t1".to_string(),
            description: Some("school report".to_string()),
            table_comment: Some("学校报表".to_string()),
            columns: (0..columns)
                .map(|i| (format!("c{i}"), if i == 0 { "主键".to_string() } else { String::new() }))
                .collect(),
            partition_columns: vec!["dt".to_string()],
            ddl_sql_file: Some("ADS/t1.sql".to_string()),
            doc_file: None,
            detail_ref: "catalog/full/ADS/ads.t1.json".to_string(),
        }
    }

    #[test]
    fn test_human_search_lines() {
        let e = entry(12);
        let results = SearchResults {
            tokens: vec!["school".to_string()],
            total: 1,
            hits: vec![ScoredEntry { score: 9.0, entry: &e }],
        };
        let dir = tempfile::tempdir().unwrap();
        let text = render_search_human(&results, &dir.path().join("catalog.search.json"));

        assert!(text.starts_with("[9.0] ADS ads.t1 (school report)\n"));
        assert!(text.contains("  COMMENT: 学校报表\n"));
        assert!(text.contains("  SQL: ADS/t1.sql\n"));
        assert!(!text.contains("DOC:"));
        assert!(text.contains("c0(主键), c1,"));
        assert!(text.contains(" +2\n"));
        assert!(text.contains("  PART: dt\n"));
        assert!(!text.contains("DETAIL:"));
    }

    #[test]
    fn test_detail_line_when_file_exists() {
        let e = entry(1);
        let dir = tempfile::tempdir().unwrap();
        let detail = dir.path().join(&e.detail_ref);
        std::fs::create_dir_all(detail.parent().unwrap()).unwrap();
        std::fs::write(&detail, "{}").unwrap();

        let results = SearchResults {
            tokens: vec!["t1".to_string()],
            total: 3,
            hits: vec![ScoredEntry { score: 5.0, entry: &e }],
        };
        let text = render_search_human(&results, &dir.path().join("catalog.search.json"));
        assert!(text.contains("  DETAIL: "));
        assert!(text.contains("Showing 1 of 3 matches"));
    }

    #[test]
    fn test_no_hits() {
        let results = SearchResults {
            tokens: vec!["nothing".to_string()],
            total: 0,
            hits: Vec::new(),
        };
        assert_eq!(
            render_search_human(&results, Path::new("catalog.search.json")),
            "No tables matched: nothing\n"
        );
    }
}
