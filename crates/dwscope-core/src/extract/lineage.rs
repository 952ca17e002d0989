//! Data-flow signals: insert targets, source tables, grouping and dedup
//!
//! Every function here expects comment-stripped text.

use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::LineageSignals;
use crate::scanner::{
    extract_balanced_parens, find_top_level_keyword, find_top_level_keyword_span,
    split_top_level_commas, squash_whitespace, unquote_identifier, Cursor, IDENT_PATTERN,
};

/// Maximum GROUP BY / PARTITION BY items kept per file
pub const MAX_EXPR_ITEMS: usize = 12;
/// Maximum distinct source tables kept per file
pub const MAX_SOURCE_TABLES: usize = 30;

/// Keywords that end a GROUP BY list
const GROUP_BY_TERMINATORS: [&str; 7] = [
    "having",
    "order by",
    "limit",
    "union",
    "distribute by",
    "sort by",
    "cluster by",
];

fn insert_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\binsert\s+(?:overwrite|into)\s+table\s+(?P<name>{IDENT_PATTERN})"
        ))
        .expect("insert table regex")
    })
}

fn from_join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(?:from|join)\s+(?P<name>{IDENT_PATTERN})"))
            .expect("from/join regex")
    })
}

fn group_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bgroup\s+by\b").expect("group by regex"))
}

fn row_number_over_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\brow_number\s*\(\s*\)\s*over\s*\(").expect("row_number regex")
    })
}

fn select_distinct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bselect\s+distinct\b").expect("select distinct regex"))
}

/// `INSERT OVERWRITE|INTO TABLE <name>` targets, unquoted, in order
pub fn find_insert_targets(sql: &str) -> Vec<String> {
    insert_table_re()
        .captures_iter(sql)
        .map(|caps| unquote_identifier(&caps["name"]))
        .collect()
}

/// Identifiers following `FROM` or `JOIN`, unquoted and de-duplicated in
/// first-seen order.
///
/// Derived tables (`FROM (select ...)`) never match, and the pseudo-names
/// `select` and `values` are ignored.
pub fn referenced_tables(sql: &str, max: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in from_join_re().captures_iter(sql) {
        let name = unquote_identifier(&caps["name"]);
        let pseudo = name.eq_ignore_ascii_case("select") || name.eq_ignore_ascii_case("values");
        if name.is_empty() || pseudo {
            continue;
        }
        if !names.contains(&name) {
            names.push(name);
            if names.len() >= max {
                break;
            }
        }
    }
    names
}

/// Items of the first `GROUP BY` list.
///
/// The list ends at a terminating clause keyword, a statement `;`, or the
/// `)` that closes the enclosing subquery.
pub fn group_by_exprs(sql: &str) -> Vec<String> {
    let Some(m) = group_by_re().find(sql) else {
        return Vec::new();
    };
    let rest = &sql[m.end()..];
    let end = clause_end(rest, &GROUP_BY_TERMINATORS);
    list_items(&rest[..end])
}

/// Items of the `PARTITION BY` list inside the first `ROW_NUMBER() OVER (...)`
pub fn row_number_partition_exprs(sql: &str) -> Vec<String> {
    let Some(m) = row_number_over_re().find(sql) else {
        return Vec::new();
    };
    let Some(window) = extract_balanced_parens(sql, m.end() - 1) else {
        return Vec::new();
    };
    let Some(partition) = find_top_level_keyword_span(window, "partition by", 0) else {
        return Vec::new();
    };
    let rest = &window[partition.end..];
    let end = find_top_level_keyword(rest, "order by", 0).unwrap_or(rest.len());
    list_items(&rest[..end])
}

pub fn has_select_distinct(sql: &str) -> bool {
    select_distinct_re().is_match(sql)
}

pub fn has_row_number(sql: &str) -> bool {
    row_number_over_re().is_match(sql)
}

/// All signals of one file. `insert_targets` are returned as written; the
/// caller resolves short names against the rest of the scan.
pub fn extract_signals(sql: &str) -> LineageSignals {
    LineageSignals {
        insert_targets: find_insert_targets(sql),
        source_tables: referenced_tables(sql, MAX_SOURCE_TABLES),
        group_by_exprs: group_by_exprs(sql),
        row_number_partition_exprs: row_number_partition_exprs(sql),
        has_select_distinct: has_select_distinct(sql),
        has_row_number: has_row_number(sql),
    }
}

fn clause_end(rest: &str, terminators: &[&str]) -> usize {
    let mut cursor = Cursor::new();
    let mut end = rest.len();
    for (i, &byte) in rest.as_bytes().iter().enumerate() {
        if !cursor.in_quote() && cursor.depth() == 0 && (byte == b')' || byte == b';') {
            end = i;
            break;
        }
        cursor.step(byte);
    }
    let scope = &rest[..end];
    terminators
        .iter()
        .filter_map(|keyword| find_top_level_keyword(scope, keyword, 0))
        .min()
        .unwrap_or(end)
}

fn list_items(block: &str) -> Vec<String> {
    split_top_level_commas(block)
        .into_iter()
        .map(squash_whitespace)
        .take(MAX_EXPR_ITEMS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_targets() {
        let sql = "INSERT OVERWRITE TABLE dws.t PARTITION (dt='x') SELECT 1;\n\
                   insert into table `ads`.`r` select 2";
        assert_eq!(find_insert_targets(sql), vec!["dws.t", "ads.r"]);
    }

    #[test]
    fn test_referenced_tables_skip_subqueries_and_dedup() {
        let sql = "select * from dwd.a a join (select * from dwd.b) b on a.id = b.id \
                   left join dwd.a c on 1 = 1 from values";
        assert_eq!(referenced_tables(sql, 30), vec!["dwd.a", "dwd.b"]);
        assert_eq!(referenced_tables(sql, 1), vec!["dwd.a"]);
    }

    #[test]
    fn test_group_by_stops_at_terminator() {
        let sql = "select a, b, count(1) from t group by a,\n  substr(b, 1, 4) having count(1) > 1";
        assert_eq!(group_by_exprs(sql), vec!["a", "substr(b, 1, 4)"]);
    }

    #[test]
    fn test_group_by_inside_subquery_stops_at_close() {
        let sql = "insert overwrite table x select * from (select a from t group by a) s;";
        assert_eq!(group_by_exprs(sql), vec!["a"]);
    }

    #[test]
    fn test_group_by_ignores_identifier_containing_keyword() {
        let sql = "select a from t group by a, limit_flag order by a";
        assert_eq!(group_by_exprs(sql), vec!["a", "limit_flag"]);
    }

    #[test]
    fn test_group_by_capped() {
        let items: Vec<String> = (0..20).map(|i| format!("c{i}")).collect();
        let sql = format!("select 1 from t group by {}", items.join(", "));
        assert_eq!(group_by_exprs(&sql).len(), MAX_EXPR_ITEMS);
    }

    #[test]
    fn test_row_number_partition() {
        let sql = "select *, ROW_NUMBER() OVER (PARTITION BY school_id, dt ORDER BY ts DESC) rn from t";
        assert_eq!(row_number_partition_exprs(sql), vec!["school_id", "dt"]);
        assert!(has_row_number(sql));
        assert!(!has_select_distinct(sql));
    }

    #[test]
    fn test_row_number_without_partition() {
        let sql = "select row_number() over (order by ts) from t";
        assert!(row_number_partition_exprs(sql).is_empty());
        assert!(has_row_number(sql));
    }

    #[test]
    fn test_extract_signals() {
        let sql = "insert into table ads.r select distinct a from dwd.x group by a;";
        let signals = extract_signals(sql);
        assert_eq!(signals.insert_targets, vec!["ads.r"]);
        assert_eq!(signals.source_tables, vec!["dwd.x"]);
        assert_eq!(signals.group_by_exprs, vec!["a"]);
        assert!(signals.has_select_distinct);
        assert!(!signals.has_row_number);
    }
}
