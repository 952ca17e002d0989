//! Quote- and parenthesis-aware scanning primitives
//!
//! This is not a SQL parser. It recovers clause boundaries and balanced
//! groupings from raw text by tracking parenthesis depth and three quoting
//! conventions (`'...'`, `"..."` and `` `...` ``) at once. Exotic syntax
//! (backslash escapes, dollar quoting, `<...>` type parameters) is
//! under-matched on purpose.
//!
//! All offsets are byte offsets into the scanned `&str`. Every delimiter the
//! cursor reacts to is ASCII, so offsets it reports always fall on UTF-8
//! character boundaries.

use std::ops::Range;

/// Regex fragment for a possibly qualified identifier: dot-separated parts,
/// each backtick, double-quote or bracket quoted, or bare.
pub const IDENT_PATTERN: &str = r#"(?:`[^`]+`|"[^"]+"|\[[^\]]+\]|[a-zA-Z0-9_]+)(?:\.(?:`[^`]+`|"[^"]+"|\[[^\]]+\]|[a-zA-Z0-9_]+))*"#;

/// Scanning state carried across bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    depth: usize,
    in_single: bool,
    in_double: bool,
    in_backtick: bool,
}

/// How the cursor classified the byte it just consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A quote character that opened or closed a quoted run
    Quote,
    /// A byte inside a quoted run
    Quoted,
    /// `(` outside quotes; depth has been incremented
    Open,
    /// `)` outside quotes; depth has been decremented (never below zero)
    Close,
    /// Any other structural byte
    Plain,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parenthesis depth relative to where scanning started
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether any quote flag is set
    pub fn in_quote(&self) -> bool {
        self.in_single || self.in_double || self.in_backtick
    }

    /// Consume one byte and update the state.
    ///
    /// A quote flag only toggles while no other quote flag is active, and
    /// parentheses only count outside all quotes.
    pub fn step(&mut self, byte: u8) -> Step {
        match byte {
            b'\'' if !self.in_double && !self.in_backtick => {
                self.in_single = !self.in_single;
                Step::Quote
            }
            b'"' if !self.in_single && !self.in_backtick => {
                self.in_double = !self.in_double;
                Step::Quote
            }
            b'`' if !self.in_single && !self.in_double => {
                self.in_backtick = !self.in_backtick;
                Step::Quote
            }
            _ if self.in_quote() => Step::Quoted,
            b'(' => {
                self.depth += 1;
                Step::Open
            }
            b')' => {
                self.depth = self.depth.saturating_sub(1);
                Step::Close
            }
            _ => Step::Plain,
        }
    }
}

/// Byte range strictly inside the parenthesis group opened at `open`.
///
/// Returns `None` when `text[open]` is not `(` or the group never closes.
pub fn balanced_parens_range(text: &str, open: usize) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut cursor = Cursor::new();
    for (i, &byte) in bytes.iter().enumerate().skip(open) {
        if cursor.step(byte) == Step::Close && cursor.depth() == 0 {
            return Some(open + 1..i);
        }
    }
    None
}

/// Text strictly inside the parenthesis group opened at `open`
pub fn extract_balanced_parens(text: &str, open: usize) -> Option<&str> {
    balanced_parens_range(text, open).map(|range| &text[range])
}

/// Split on commas at depth zero and outside quotes.
///
/// Segments are trimmed; empty segments are dropped.
pub fn split_top_level_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut cursor = Cursor::new();
    let mut start = 0;

    for (i, &byte) in text.as_bytes().iter().enumerate() {
        if cursor.step(byte) == Step::Plain && byte == b',' && cursor.depth() == 0 {
            push_trimmed(&mut parts, &text[start..i]);
            start = i + 1;
        }
    }
    push_trimmed(&mut parts, &text[start..]);
    parts
}

fn push_trimmed<'a>(parts: &mut Vec<&'a str>, segment: &'a str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        parts.push(segment);
    }
}

/// Offset of the first top-level occurrence of `keyword` at or after `from`.
///
/// Matching is case-insensitive and whole-word: the characters on either
/// side must not be alphanumeric or `_`. A multi-word keyword such as
/// `"order by"` matches any run of whitespace between its words.
pub fn find_top_level_keyword(text: &str, keyword: &str, from: usize) -> Option<usize> {
    find_top_level_keyword_span(text, keyword, from).map(|span| span.start)
}

/// Like [`find_top_level_keyword`], returning the full matched range
pub fn find_top_level_keyword_span(text: &str, keyword: &str, from: usize) -> Option<Range<usize>> {
    let words: Vec<&str> = keyword.split_whitespace().collect();
    if words.is_empty() || from > text.len() || !text.is_char_boundary(from) {
        return None;
    }

    let bytes = text.as_bytes();
    let mut cursor = Cursor::new();
    for i in from..bytes.len() {
        if cursor.step(bytes[i]) != Step::Plain || cursor.depth() != 0 {
            continue;
        }
        if let Some(end) = match_keyword_at(text, i, &words) {
            return Some(i..end);
        }
    }
    None
}

/// Offset of the first `needle` byte at depth zero and outside quotes
pub fn find_top_level_byte(text: &str, needle: u8, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut cursor = Cursor::new();
    for i in from..bytes.len() {
        if cursor.step(bytes[i]) == Step::Plain && cursor.depth() == 0 && bytes[i] == needle {
            return Some(i);
        }
    }
    None
}

fn match_keyword_at(text: &str, start: usize, words: &[&str]) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut pos = start;

    for (n, word) in words.iter().enumerate() {
        if n > 0 {
            let gap = bytes[pos..]
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            if gap == 0 {
                return None;
            }
            pos += gap;
        }
        let end = pos + word.len();
        if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(word.as_bytes()) {
            return None;
        }
        pos = end;
    }

    if !text.is_char_boundary(start) || !text.is_char_boundary(pos) {
        return None;
    }
    let before = text[..start].chars().next_back();
    let after = text[pos..].chars().next();
    if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
        return None;
    }
    Some(pos)
}

/// Identifier character: alphanumeric (any script) or underscore
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace `-- ...` and `/* ... */` comments outside quotes with a space.
///
/// Line comments keep their terminating newline. An unterminated block
/// comment swallows the rest of the text.
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = Cursor::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !cursor.in_quote() {
            let next = bytes.get(i + 1).copied();
            if bytes[i] == b'-' && next == Some(b'-') {
                out.push_str(&text[copied..i]);
                out.push(' ');
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
                copied = i;
                continue;
            }
            if bytes[i] == b'/' && next == Some(b'*') {
                out.push_str(&text[copied..i]);
                out.push(' ');
                i = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
                copied = i;
                continue;
            }
        }
        cursor.step(bytes[i]);
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}

/// Remove one layer of identifier quoting (`` `x` ``, `"x"` or `[x]`)
pub fn strip_identifier_quotes(raw: &str) -> &str {
    let s = raw.trim();
    let quoted = s.len() >= 2
        && ((s.starts_with('`') && s.ends_with('`'))
            || (s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('[') && s.ends_with(']')));
    if quoted {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Unquote every part of a dotted identifier: `` `db`.`t` `` becomes `db.t`
pub fn unquote_identifier(raw: &str) -> String {
    let mut parts = Vec::new();
    let mut rest = raw.trim();
    while !rest.is_empty() {
        let close = match rest.as_bytes()[0] {
            b'`' => Some('`'),
            b'"' => Some('"'),
            b'[' => Some(']'),
            _ => None,
        };
        let (part, next) = match close.and_then(|c| rest[1..].find(c).map(|i| i + 1)) {
            Some(end) => (&rest[1..end], &rest[end + 1..]),
            None => match rest.find('.') {
                Some(dot) => (&rest[..dot], &rest[dot..]),
                None => (rest, ""),
            },
        };
        parts.push(part);
        rest = next.strip_prefix('.').unwrap_or(next);
    }
    parts.join(".")
}

/// CJK unified ideograph
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Collapse every whitespace run into a single space
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_parens_simple() {
        let sql = "create table t (a int, b decimal(10,2)) stored as orc";
        let open = sql.find('(').unwrap();
        assert_eq!(
            extract_balanced_parens(sql, open),
            Some("a int, b decimal(10,2)")
        );
    }

    #[test]
    fn test_balanced_parens_ignores_quoted_parens() {
        let sql = "(a string comment 'x) y', b int) tail";
        assert_eq!(
            extract_balanced_parens(sql, 0),
            Some("a string comment 'x) y', b int")
        );
    }

    #[test]
    fn test_balanced_parens_unbalanced() {
        assert_eq!(extract_balanced_parens("(a, (b)", 0), None);
        assert_eq!(extract_balanced_parens("abc", 0), None);
        assert_eq!(extract_balanced_parens("(a)", 5), None);
    }

    #[test]
    fn test_split_top_level_commas() {
        let parts = split_top_level_commas(" a , f(b, c), 'x,y', \"p,q\", `m,n` ,, ");
        assert_eq!(parts, vec!["a", "f(b, c)", "'x,y'", "\"p,q\"", "`m,n`"]);
    }

    #[test]
    fn test_split_survives_stray_close_paren() {
        let parts = split_top_level_commas("a), b, c");
        assert_eq!(parts, vec!["a)", "b", "c"]);
    }

    #[test]
    fn test_quote_flags_do_not_toggle_inside_other_quotes() {
        // the apostrophe inside double quotes must not open a single-quoted run
        let parts = split_top_level_commas("\"it's\", b");
        assert_eq!(parts, vec!["\"it's\"", "b"]);

        let mut cursor = Cursor::new();
        for byte in "`a'b`".bytes() {
            cursor.step(byte);
        }
        assert!(!cursor.in_quote());
    }

    #[test]
    fn test_find_keyword_word_boundary() {
        let sql = "select region, session_on from t join u on t.id = u.id";
        let pos = find_top_level_keyword(sql, "on", 0).unwrap();
        assert_eq!(&sql[pos..pos + 2], "on");
        assert_eq!(pos, sql.find(" on ").unwrap() + 1);
    }

    #[test]
    fn test_find_keyword_skips_literals_and_nesting() {
        let sql = "select 'from', (select x from y) as z from t";
        let pos = find_top_level_keyword(sql, "from", 0).unwrap();
        assert_eq!(&sql[pos..], "from t");
    }

    #[test]
    fn test_find_keyword_case_insensitive_multiword() {
        let sql = "SELECT a FROM t ORDER\n   BY a";
        let span = find_top_level_keyword_span(sql, "order by", 0).unwrap();
        assert_eq!(&sql[span], "ORDER\n   BY");
    }

    #[test]
    fn test_find_keyword_not_found() {
        assert_eq!(find_top_level_keyword("select a_from from_b", "from", 0), None);
        assert_eq!(find_top_level_keyword("select a", "", 0), None);
        assert_eq!(find_top_level_keyword("select a", "a", 100), None);
    }

    #[test]
    fn test_find_keyword_cjk_neighbour_is_word_char() {
        assert_eq!(find_top_level_keyword("高on校", "on", 0), None);
        assert_eq!(find_top_level_keyword("高 on 校", "on", 0), Some(4));
    }

    #[test]
    fn test_find_keyword_from_offset() {
        let sql = "select a from t union select b from u";
        let first = find_top_level_keyword(sql, "from", 0).unwrap();
        let second = find_top_level_keyword(sql, "from", first + 4).unwrap();
        assert_eq!(&sql[second..], "from u");
    }

    #[test]
    fn test_find_top_level_byte() {
        let sql = "select ';' , f(';'); select 2";
        assert_eq!(find_top_level_byte(sql, b';', 0), Some(sql.find("); ").unwrap() + 1));
    }

    #[test]
    fn test_strip_comments() {
        let sql = "select a, -- trailing, comment\n b /* block\n */ from t where c = '--not'";
        let stripped = strip_comments(sql);
        assert_eq!(stripped, "select a,  \n b   from t where c = '--not'");
    }

    #[test]
    fn test_strip_comments_keeps_unicode() {
        let stripped = strip_comments("id int comment '主键' -- 备注\n");
        assert_eq!(stripped, "id int comment '主键'  \n");
    }

    #[test]
    fn test_unquote_identifier() {
        assert_eq!(unquote_identifier("`ads`.`t1`"), "ads.t1");
        assert_eq!(unquote_identifier("\"ods\".t2"), "ods.t2");
        assert_eq!(unquote_identifier("[dws.t3]"), "dws.t3");
        assert_eq!(unquote_identifier("dwd.t4"), "dwd.t4");
        assert_eq!(unquote_identifier("`my table`"), "my table");
    }

    #[test]
    fn test_strip_identifier_quotes() {
        assert_eq!(strip_identifier_quotes("`db.t`"), "db.t");
        assert_eq!(strip_identifier_quotes("\"t\""), "t");
        assert_eq!(strip_identifier_quotes("[t]"), "t");
        assert_eq!(strip_identifier_quotes("db.t"), "db.t");
        assert_eq!(strip_identifier_quotes("`"), "`");
    }
}
