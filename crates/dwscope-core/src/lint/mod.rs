//! Static query linter
//!
//! Runs heuristic and dialect-specific checks over a candidate query. Every
//! rule is independent; findings are advisory and returned in rule order.

pub mod clauses;
mod lookup;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::dialect::SqlDialect;
use crate::error::{Finding, FindingKind};
use crate::extract::lineage::referenced_tables;
use crate::scanner::{is_word_char, squash_whitespace, strip_comments};

pub use lookup::{CatalogLookup, LookupEntry};

/// Referenced tables checked against the catalog per query
const MAX_REFERENCED_TABLES: usize = 50;

/// Tokens that only exist in Hive/SparkSQL
const HIVE_ONLY_TOKENS: [&str; 5] = [
    "lateral view",
    "explode(",
    "collect_set(",
    "from_unixtime(",
    "unix_timestamp(",
];

pub const DEFAULT_MANY_JOINS_THRESHOLD: usize = 3;

fn destructive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:drop|truncate|delete|update|insert\s+overwrite|insert\s+into|create\s+table|alter\s+table)\b",
        )
        .expect("destructive regex")
    })
}

fn select_star_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bselect\s+\*").expect("select star regex"))
}

/// Tunable rule parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintConfig {
    /// `many-joins` fires at this many joins
    pub many_joins_threshold: usize,
    /// Finding kinds that are never reported
    pub disabled: HashSet<FindingKind>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            many_joins_threshold: DEFAULT_MANY_JOINS_THRESHOLD,
            disabled: HashSet::new(),
        }
    }
}

/// Lints candidate queries for one dialect
#[derive(Debug, Clone, Default)]
pub struct Linter {
    dialect: SqlDialect,
    config: LintConfig,
    catalog: Option<CatalogLookup>,
}

impl Linter {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: LintConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable the partition checks. Without a catalog they are skipped and
    /// all other rules still run.
    pub fn with_catalog(mut self, catalog: Option<CatalogLookup>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Check one query. Comments are removed before any rule runs.
    pub fn check(&self, sql: &str) -> Vec<Finding> {
        let sql = strip_comments(sql);
        let lower = sql.to_lowercase();

        let mut findings = Vec::new();
        self.check_destructive(&sql, &mut findings);
        self.check_select_star(&sql, &mut findings);
        self.check_partitions(&sql, &mut findings);
        self.check_dialect(&sql, &lower, &mut findings);
        self.check_many_joins(&lower, &mut findings);
        self.check_order_by(&sql, &mut findings);
        self.check_scalar_subqueries(&sql, &mut findings);

        findings.retain(|f| !self.config.disabled.contains(&f.kind));
        debug!(dialect = %self.dialect, count = findings.len(), "lint finished");
        findings
    }

    fn check_destructive(&self, sql: &str, findings: &mut Vec<Finding>) {
        if destructive_re().is_match(sql) {
            findings.push(
                Finding::warning(
                    FindingKind::Destructive,
                    "statement is not read-only (drop/truncate/delete/update/insert/create/alter)",
                )
                .with_help("generated queries should only read and export data"),
            );
        }
    }

    fn check_select_star(&self, sql: &str, findings: &mut Vec<Finding>) {
        if select_star_re().is_match(sql) {
            findings.push(
                Finding::warning(FindingKind::SelectStar, "found 'select *'")
                    .with_help("list the columns explicitly so results stay reconcilable and dimension columns do not balloon"),
            );
        }
    }

    fn check_partitions(&self, sql: &str, findings: &mut Vec<Finding>) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        let where_block = clauses::where_block(sql)
            .map(|block| block.trim().to_lowercase())
            .unwrap_or_default();

        let mut reported: HashSet<&str> = HashSet::new();
        for table in referenced_tables(sql, MAX_REFERENCED_TABLES) {
            let Some(entry) = catalog.get(&table) else {
                continue;
            };
            if entry.partition_columns.is_empty() || !reported.insert(entry.id.as_str()) {
                continue;
            }
            let columns = entry.partition_columns.join(", ");

            if where_block.is_empty() {
                findings.push(
                    Finding::warning(
                        FindingKind::MissingWhere,
                        format!(
                            "table {} has partition columns [{}] but the query has no WHERE clause",
                            entry.name, columns
                        ),
                    )
                    .with_help("partitions cannot be pruned; expect a full table scan"),
                );
            } else if !entry
                .partition_columns
                .iter()
                .any(|column| mentions_word(&where_block, &column.to_lowercase()))
            {
                findings.push(
                    Finding::warning(
                        FindingKind::MissingPartitionFilter,
                        format!(
                            "table {} has partition columns [{}] but WHERE filters on none of them",
                            entry.name, columns
                        ),
                    )
                    .with_help("filter on a partition column (usually a date) so it can be pushed down"),
                );
            }
        }
    }

    fn check_dialect(&self, sql: &str, lower: &str, findings: &mut Vec<Finding>) {
        if self.dialect.is_gaussdb() {
            if sql.contains('`') {
                findings.push(
                    Finding::warning(
                        FindingKind::GaussdbBackticks,
                        "GaussDB does not accept backtick-quoted identifiers",
                    )
                    .with_help("leave identifiers unquoted or use double quotes"),
                );
            }
            if let Some(token) = HIVE_ONLY_TOKENS.iter().find(|t| lower.contains(*t)) {
                findings.push(
                    Finding::warning(
                        FindingKind::GaussdbHiveOnly,
                        format!("found Hive/SparkSQL-only syntax '{}'", token),
                    )
                    .with_help("rewrite it with the GaussDB equivalent"),
                );
            }
        }

        if let Some(kind) = self.dialect.postgres_cast_finding() {
            if sql.contains("::") {
                findings.push(
                    Finding::warning(
                        kind,
                        format!("found a Postgres-style '::' cast, which {} rejects", self.dialect),
                    )
                    .with_help("use cast(x as type) instead"),
                );
            }
        }
    }

    fn check_many_joins(&self, lower: &str, findings: &mut Vec<Finding>) {
        let padded = format!(" {} ", squash_whitespace(lower));
        let joins = padded.matches(" join ").count();
        if joins >= self.config.many_joins_threshold && !lower.contains("row_number") {
            findings.push(
                Finding::warning(
                    FindingKind::ManyJoins,
                    format!("query has {joins} joins and no row_number() dedup"),
                )
                .with_help("multi-version dimension rows can fan out many-to-many; deduplicate or pick the latest row before joining"),
            );
        }
    }

    fn check_order_by(&self, sql: &str, findings: &mut Vec<Finding>) {
        if !self.dialect.requires_selected_order_by() {
            return;
        }
        let projection = clauses::select_clause(sql).unwrap_or_default();
        if clauses::is_wildcard_projection(projection) {
            return;
        }
        let Some(order_by) = clauses::order_by_clause(sql) else {
            return;
        };

        let selected = clauses::select_identifiers(projection);
        let missing: Vec<String> = clauses::order_by_identifiers(order_by)
            .into_iter()
            .filter(|ident| !ident.bytes().all(|b| b.is_ascii_digit()) && !selected.contains(ident))
            .collect();
        if !missing.is_empty() {
            findings.push(
                Finding::warning(
                    FindingKind::HiveOrderbyNotSelected,
                    format!(
                        "ORDER BY references columns missing from the final SELECT list ({})",
                        missing.join(", ")
                    ),
                )
                .with_help("some Hive versions fail with 'Invalid table alias or column reference'; also select the sort columns or order by position"),
            );
        }
    }

    fn check_scalar_subqueries(&self, sql: &str, findings: &mut Vec<Finding>) {
        if !self.dialect.rejects_scalar_subqueries() {
            return;
        }
        if clauses::select_clause(sql).is_some_and(clauses::contains_subquery) {
            findings.push(
                Finding::warning(
                    FindingKind::HiveLegacyScalarSubquerySelect,
                    "scalar subquery '(select ...)' in the SELECT list",
                )
                .with_help("legacy Hive reports 'Unsupported SubQuery Expression'; rewrite as a join, derived table or CTE"),
            );
        }
        for on_clause in clauses::on_clauses(sql) {
            if clauses::contains_subquery(on_clause) {
                findings.push(
                    Finding::warning(
                        FindingKind::HiveLegacyScalarSubqueryOn,
                        "subquery '(select ...)' inside a JOIN ... ON condition",
                    )
                    .with_help("turn the subquery into a derived table and join it, or aggregate in two steps"),
                );
            }
        }
    }
}

/// Whole-word containment, with the same word characters as the scanner
fn mentions_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codes(findings: &[Finding]) -> Vec<&'static str> {
        findings.iter().map(Finding::code).collect()
    }

    #[test]
    fn test_mentions_word() {
        assert!(mentions_word("dt = '2024'", "dt"));
        assert!(mentions_word("a.dt>1", "dt"));
        assert!(!mentions_word("dt_flag = 1", "dt"));
        assert!(!mentions_word("audit = 1", "dt"));
    }

    #[test]
    fn test_comments_do_not_trigger_rules() {
        let linter = Linter::new(SqlDialect::Hive);
        let findings = linter.check("-- drop table x\nselect a from t /* select * */");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_rules_are_cumulative_and_ordered() {
        let linter = Linter::new(SqlDialect::Hive);
        let findings = linter.check("insert into table x select * from t where a::int > 1");
        assert_eq!(
            codes(&findings),
            vec!["destructive", "select-star", "hive-postgres-cast"]
        );
    }

    #[test]
    fn test_disabled_codes_are_filtered() {
        let config = LintConfig {
            disabled: [FindingKind::SelectStar].into_iter().collect(),
            ..Default::default()
        };
        let linter = Linter::new(SqlDialect::Hive).with_config(config);
        assert!(linter.check("select * from t").is_empty());
    }

    #[test]
    fn test_many_joins_threshold() {
        let sql = "select a.x from a\njoin b on a.id = b.id join c on a.id = c.id\n  join d on a.id = d.id";
        let linter = Linter::new(SqlDialect::SparkSql);
        assert_eq!(codes(&linter.check(sql)), vec!["many-joins"]);

        let dedup = format!("{sql} where row_number() over (partition by a.id) = 1");
        assert!(linter.check(&dedup).is_empty());

        let relaxed = Linter::new(SqlDialect::SparkSql).with_config(LintConfig {
            many_joins_threshold: 4,
            ..Default::default()
        });
        assert!(relaxed.check(sql).is_empty());
    }

    #[test]
    fn test_gaussdb_reports_first_hive_token_only() {
        let linter = Linter::new(SqlDialect::GaussDb);
        let findings = linter.check(
            "select from_unixtime(ts), collect_set(x) from t lateral view explode(arr) e as v",
        );
        assert_eq!(codes(&findings), vec!["gaussdb-hive-only"]);
        assert!(findings[0].message.contains("lateral view"));
    }

    #[test]
    fn test_wildcard_projection_skips_order_by_check() {
        let linter = Linter::new(SqlDialect::Hive);
        assert_eq!(
            codes(&linter.check("select t.* from t order by b")),
            Vec::<&str>::new()
        );
    }

    #[test]
    fn test_legacy_scalar_subqueries() {
        let linter = Linter::new(SqlDialect::HiveLegacy);
        let sql = "select a.x, (select max(y) from c) m from a \
                   join b on a.id = (select min(id) from d) order by 1";
        assert_eq!(
            codes(&linter.check(sql)),
            vec![
                "hive-legacy-scalar-subquery-select",
                "hive-legacy-scalar-subquery-on"
            ]
        );
        assert!(Linter::new(SqlDialect::Hive)
            .check(sql)
            .iter()
            .all(|f| !f.code().starts_with("hive-legacy")));
    }
}
