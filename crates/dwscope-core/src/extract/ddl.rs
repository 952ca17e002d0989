//! Table structure from `CREATE TABLE` statements

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::ColumnSpec;
use crate::scanner::{
    balanced_parens_range, find_top_level_byte, find_top_level_keyword_span, is_cjk,
    split_top_level_commas, strip_comments, unquote_identifier, Cursor, Step, IDENT_PATTERN,
};

/// How far past the column block a table-level comment may appear, in chars
const TABLE_COMMENT_WINDOW: usize = 500;

/// Leading words that start a clause, never a column
const NON_COLUMN_NAMES: [&str; 4] = ["partitioned", "clustered", "stored", "tblproperties"];

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\bcreate\s+(?:external\s+)?table\s+(?:if\s+not\s+exists\s+)?(?P<name>{IDENT_PATTERN})"
        ))
        .expect("create table regex")
    })
}

fn partitioned_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bpartitioned\s+by\s*\(").expect("partitioned by regex"))
}

fn column_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bcomment\s+(?:'([^']*)'|"([^"]*)")"#).expect("column comment regex")
    })
}

fn comment_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*=?\s*(?:'([^']*)'|"([^"]*)")"#).expect("comment value regex")
    })
}

fn tblproperties_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)['"]comment['"]\s*=\s*(?:'([^']*)'|"([^"]*)")"#)
            .expect("tblproperties comment regex")
    })
}

/// Structure recovered from the first `CREATE TABLE` of a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub partition_columns: Vec<ColumnSpec>,
    pub table_comment: Option<String>,
}

/// Every `CREATE TABLE` name in the text, unquoted, in order
pub fn find_create_table_names(sql: &str) -> Vec<String> {
    create_table_re()
        .captures_iter(sql)
        .map(|caps| unquote_identifier(&caps["name"]))
        .collect()
}

/// Parse the first `CREATE TABLE` statement.
///
/// The column block must directly follow the table name; `CREATE TABLE ...
/// AS SELECT` and `LIKE` forms yield a name without columns. Partition
/// columns and the table comment are only searched after the column block
/// and before the end of the statement.
pub fn parse_create_table(sql: &str) -> Option<CreateTable> {
    let caps = create_table_re().captures(sql)?;
    let mut table = CreateTable {
        name: unquote_identifier(&caps["name"]),
        ..Default::default()
    };

    let after_name = caps.get(0)?.end();
    let rest = &sql[after_name..];
    let open = after_name + (rest.len() - rest.trim_start().len());
    let Some(block) = balanced_parens_range(sql, open) else {
        return Some(table);
    };

    table.columns = parse_column_block(&sql[block.clone()]);

    let tail = &sql[block.end + 1..];
    let tail = match find_top_level_byte(tail, b';', 0) {
        Some(end) => &tail[..end],
        None => tail,
    };
    table.partition_columns = parse_partition_columns(tail);
    table.table_comment = find_table_comment(tail);
    Some(table)
}

/// Columns of a `CREATE TABLE (...)` block, constraint lines skipped
pub fn parse_column_block(block: &str) -> Vec<ColumnSpec> {
    split_top_level_commas(block)
        .into_iter()
        .filter_map(|segment| parse_column_segment(segment, true))
        .collect()
}

/// Columns of the first `PARTITIONED BY (...)` block in `text`
pub fn parse_partition_columns(text: &str) -> Vec<ColumnSpec> {
    let Some(m) = partitioned_by_re().find(text) else {
        return Vec::new();
    };
    let Some(block) = balanced_parens_range(text, m.end() - 1) else {
        return Vec::new();
    };
    split_top_level_commas(&text[block])
        .into_iter()
        .filter_map(|segment| parse_column_segment(segment, false))
        .collect()
}

/// Parse `name type [... COMMENT '...']` from one comma-separated segment
pub fn parse_column_segment(segment: &str, skip_constraints: bool) -> Option<ColumnSpec> {
    let line = strip_comments(segment);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if skip_constraints && is_constraint_line(line) {
        return None;
    }

    let (name, rest) = split_leading_identifier(line)?;
    if skip_constraints && NON_COLUMN_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return None;
    }

    let rest = rest.trim_start();
    let declared_type = leading_type(rest);
    if declared_type.is_empty() {
        return None;
    }

    let mut column = ColumnSpec::new(name, declared_type.trim_end_matches(','));
    if let Some(comment) = column_comment_re()
        .captures(&rest[declared_type.len()..])
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
    {
        column = column.with_comment(comment.as_str().trim());
    }
    Some(column)
}

fn is_constraint_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    let first = leading_word(&lower);
    match first {
        "unique" | "constraint" | "index" | "key" => true,
        "primary" | "foreign" => leading_word(lower[first.len()..].trim_start()) == "key",
        _ => false,
    }
}

fn leading_word(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
        .unwrap_or(s.len());
    &s[..end]
}

/// Split off the column name, which may be backtick, double-quote or
/// bracket quoted. Returns `None` when nothing follows the name.
fn split_leading_identifier(line: &str) -> Option<(&str, &str)> {
    let close = match line.as_bytes().first()? {
        b'`' => Some('`'),
        b'"' => Some('"'),
        b'[' => Some(']'),
        _ => None,
    };
    let (name, rest) = match close {
        Some(close) => {
            let end = line[1..].find(close)? + 1;
            (&line[1..end], &line[end + 1..])
        }
        None => {
            let end = line.find(char::is_whitespace)?;
            (&line[..end], &line[end..])
        }
    };
    let rest = rest.trim_start();
    if name.is_empty() || rest.is_empty() {
        return None;
    }
    Some((name, rest))
}

/// The declared type: everything up to the first whitespace that is not
/// inside parentheses or quotes, so `DECIMAL(10, 2)` stays whole.
fn leading_type(rest: &str) -> &str {
    let mut cursor = Cursor::new();
    for (i, &byte) in rest.as_bytes().iter().enumerate() {
        if cursor.step(byte) == Step::Plain && cursor.depth() == 0 && byte.is_ascii_whitespace() {
            return &rest[..i];
        }
    }
    rest
}

/// Table-level comment in the text following the column block.
///
/// Field comments inside `PARTITIONED BY (...)` are nested and never
/// matched; a `TBLPROPERTIES ('comment'='...')` entry is the fallback.
pub fn find_table_comment(tail: &str) -> Option<String> {
    let window_end = tail
        .char_indices()
        .nth(TABLE_COMMENT_WINDOW)
        .map_or(tail.len(), |(i, _)| i);
    let window = &tail[..window_end];

    let mut from = 0;
    while let Some(span) = find_top_level_keyword_span(window, "comment", from) {
        if let Some(value) = first_group(comment_value_re(), &window[span.end..]) {
            return non_empty(value);
        }
        from = span.end;
    }
    first_group(tblproperties_comment_re(), window).and_then(non_empty)
}

fn first_group<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = re.captures(text)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Human-readable description carried in a file name.
///
/// `产业地图-国内高校信息-ads_school.sql` yields `产业地图-国内高校信息`: the
/// stem is split at its last `-` followed by an ASCII letter or `_`, and the
/// prefix is used when it contains CJK text.
pub fn description_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let bytes = stem.as_bytes();
    let split = (0..bytes.len().saturating_sub(1)).rev().find(|&i| {
        bytes[i] == b'-' && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_')
    })?;
    let prefix = &stem[..split];
    prefix.chars().any(is_cjk).then(|| prefix.to_string())
}
