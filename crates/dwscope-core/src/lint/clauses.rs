//! Clause recovery for the linter: projection list, ORDER BY, WHERE, ON
//!
//! Inputs are expected to be comment-stripped.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::scanner::{
    find_top_level_byte, find_top_level_keyword, find_top_level_keyword_span,
    split_top_level_commas, strip_identifier_quotes,
};

/// Keywords that end an ORDER BY list
const ORDER_BY_TERMINATORS: [&str; 5] = ["group by", "having", "order by", "limit", "union"];

/// Keywords that end a JOIN ... ON predicate
const ON_TERMINATORS: [&str; 17] = [
    "join",
    "left join",
    "left outer join",
    "left semi join",
    "left anti join",
    "right join",
    "right outer join",
    "full join",
    "full outer join",
    "inner join",
    "cross join",
    "where",
    "group by",
    "having",
    "order by",
    "limit",
    "union",
];

/// Upper bound on ON clauses inspected per query
pub const MAX_ON_CLAUSES: usize = 20;

fn clause_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:group\s+by|having|order\s+by|limit|union)\b|;")
            .expect("clause end regex")
    })
}

fn where_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwhere\b").expect("where regex"))
}

fn explicit_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\bas\s+(?P<alias>`[^`]+`|"[^"]+"|\[[^\]]+\]|[a-zA-Z_][a-zA-Z0-9_]*)\s*$"#,
        )
        .expect("alias regex")
    })
}

fn bare_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:`[^`]+`|"[^"]+"|\[[^\]]+\]|[a-zA-Z_][a-zA-Z0-9_]*)$"#)
            .expect("bare identifier regex")
    })
}

fn quoted_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:`[^`]+`|"[^"]+"|\[[^\]]+\])$"#).expect("quoted identifier regex")
    })
}

fn column_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z_][a-zA-Z0-9_]*\.)?(?P<column>[a-zA-Z_][a-zA-Z0-9_]*)$")
            .expect("column reference regex")
    })
}

fn nulls_order_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s+nulls\s+(?:first|last)\s*$").expect("nulls ordering regex")
    })
}

fn direction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:asc|desc)\s*$").expect("direction regex"))
}

fn set_quantifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(?:distinct|all)\s+").expect("set quantifier regex"))
}

fn subquery_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\(\s*select\b").expect("subquery regex"))
}

/// Text between the first top-level `SELECT` and its top-level `FROM`
pub fn select_clause(sql: &str) -> Option<&str> {
    let select = find_top_level_keyword_span(sql, "select", 0)?;
    let from = find_top_level_keyword(sql, "from", select.end)?;
    Some(&sql[select.end..from])
}

/// The first top-level `ORDER BY` list
pub fn order_by_clause(sql: &str) -> Option<&str> {
    let order_by = find_top_level_keyword_span(sql, "order by", 0)?;
    let rest = &sql[order_by.end..];
    let end = ORDER_BY_TERMINATORS
        .iter()
        .filter_map(|keyword| find_top_level_keyword(rest, keyword, 0))
        .chain(find_top_level_byte(rest, b';', 0))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Text after the first `WHERE` up to the next clause keyword or `;`.
///
/// Any `WHERE` counts, including one inside a subquery.
pub fn where_block(sql: &str) -> Option<&str> {
    let m = where_re().find(sql)?;
    let rest = &sql[m.end()..];
    let end = clause_end_re().find(rest).map_or(rest.len(), |m| m.start());
    Some(&rest[..end])
}

/// Predicates of the top-level `JOIN ... ON` clauses, in order
pub fn on_clauses(sql: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut from = 0;
    while clauses.len() < MAX_ON_CLAUSES {
        let Some(on) = find_top_level_keyword_span(sql, "on", from) else {
            break;
        };
        let end = ON_TERMINATORS
            .iter()
            .filter_map(|keyword| find_top_level_keyword(sql, keyword, on.end))
            .min()
            .unwrap_or(sql.len());
        clauses.push(&sql[on.end..end]);
        from = on.end;
    }
    clauses
}

/// Whether the projection contains `*` or `alias.*`
pub fn is_wildcard_projection(clause: &str) -> bool {
    split_top_level_commas(clause)
        .iter()
        .any(|item| *item == "*" || item.ends_with(".*"))
}

/// Whether `text` contains a parenthesized `select`
pub fn contains_subquery(text: &str) -> bool {
    subquery_re().is_match(text)
}

/// Lowercased output names of a projection list.
///
/// Each item resolves to its explicit `AS` alias, else a trailing bare
/// alias token, else the last segment of a simple column reference.
/// Expressions without an alias contribute nothing.
pub fn select_identifiers(clause: &str) -> HashSet<String> {
    let clause = set_quantifier_re().replace(clause, "");
    let mut out = HashSet::new();
    for item in split_top_level_commas(&clause) {
        if let Some(caps) = explicit_alias_re().captures(item) {
            out.insert(strip_identifier_quotes(&caps["alias"]).to_lowercase());
            continue;
        }

        let tokens: Vec<&str> = item.split_whitespace().collect();
        if let [_, .., tail] = tokens.as_slice() {
            if bare_identifier_re().is_match(tail) {
                out.insert(strip_identifier_quotes(tail).to_lowercase());
                continue;
            }
        }

        if let Some(caps) = column_ref_re().captures(item) {
            out.insert(caps["column"].to_lowercase());
        }
    }
    out
}

/// Lowercased identifiers an ORDER BY list sorts on.
///
/// Ordinals are kept verbatim; expressions are skipped since they cannot
/// be checked against the projection.
pub fn order_by_identifiers(clause: &str) -> Vec<String> {
    let mut out = Vec::new();
    for item in split_top_level_commas(clause) {
        let item = nulls_order_re().replace(item, "");
        let item = direction_re().replace(item.trim(), "");
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        if item.bytes().all(|b| b.is_ascii_digit()) {
            out.push(item.to_string());
        } else if quoted_identifier_re().is_match(item) {
            out.push(strip_identifier_quotes(item).to_lowercase());
        } else if let Some(caps) = column_ref_re().captures(item) {
            out.push(caps["column"].to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sorted(set: HashSet<String>) -> Vec<String> {
        let mut v: Vec<_> = set.into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn test_select_clause_is_top_level() {
        let sql = "with x as (select a from s) select x.a, (select 1 from u) b from x";
        assert_eq!(select_clause(sql), Some(" x.a, (select 1 from u) b "));
        assert_eq!(select_clause("update t set a = 1"), None);
    }

    #[test]
    fn test_select_identifiers() {
        let clause = "t.region, count(1) AS `Cnt`, sum(x) total, upper(name), \"Quoted\"";
        assert_eq!(
            sorted(select_identifiers(clause)),
            vec!["cnt", "region", "total"]
        );
    }

    #[test]
    fn test_select_identifiers_skip_set_quantifier() {
        assert_eq!(sorted(select_identifiers(" DISTINCT t.a, b ")), vec!["a", "b"]);
        assert_eq!(sorted(select_identifiers(" all x AS y ")), vec!["y"]);
        assert_eq!(sorted(select_identifiers(" all_rows ")), vec!["all_rows"]);
    }

    #[test]
    fn test_order_by_clause_bounds() {
        let sql = "select a from t order by a desc, 2 limit 10";
        assert_eq!(order_by_clause(sql), Some(" a desc, 2 "));
        let windowed = "select row_number() over (order by ts) rn from t";
        assert_eq!(order_by_clause(windowed), None);
    }

    #[test]
    fn test_order_by_identifiers() {
        let clause = " t.b DESC NULLS LAST, 2, `C` asc, lower(d), e";
        assert_eq!(order_by_identifiers(clause), vec!["b", "2", "c", "e"]);
    }

    #[test]
    fn test_where_block() {
        let sql = "select a from t where dt = '1' and x > 2 group by a";
        assert_eq!(where_block(sql), Some(" dt = '1' and x > 2 "));
        assert_eq!(where_block("select a from t"), None);
    }

    #[test]
    fn test_on_clauses() {
        let sql = "select * from a join b on a.id = b.id left join c on a.k = (select max(k) from d) where a.x = 1";
        assert_eq!(
            on_clauses(sql),
            vec![" a.id = b.id ", " a.k = (select max(k) from d) "]
        );
        assert!(on_clauses("select region_on from t").is_empty());
    }

    #[test]
    fn test_wildcard_and_subquery() {
        assert!(is_wildcard_projection(" t.*, a "));
        assert!(is_wildcard_projection(" * "));
        assert!(!is_wildcard_projection(" count(*) "));
        assert!(contains_subquery("a = ( SELECT 1)"));
        assert!(!contains_subquery("selected(1)"));
    }
}
