//! Retrieval engine: free-text query tokenizer and catalog entry ranking

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Layer, SearchEntry, SearchIndex};
use crate::error::CatalogError;
use crate::scanner::is_cjk;

const STOPWORDS_EN: [&str; 45] = [
    "select", "from", "where", "join", "left", "right", "inner", "outer", "group", "by", "order",
    "limit", "and", "or", "as", "on", "in", "is", "not", "null", "like", "between", "case", "when",
    "then", "else", "end", "having", "insert", "into", "table", "create", "drop", "alter", "set",
    "with", "union", "all", "distinct", "true", "false", "the", "of", "for", "to",
];

const STOPWORDS_ZH: [&str; 22] = [
    "查询", "统计", "导出", "获取", "数据", "信息", "明细", "汇总", "报表", "字段", "表", "结果",
    "最近", "按", "各", "所有", "需要", "希望", "帮忙", "帮我", "请", "一下",
];

/// Frequent column-name fragments that match almost everything
const LOW_INFO_TOKENS: [&str; 8] = ["id", "name", "code", "dt", "ds", "type", "status", "flag"];

const LOW_INFO_WEIGHT: f64 = 0.5;

const NAME_WEIGHT: f64 = 5.0;
const DESCRIPTION_WEIGHT: f64 = 4.0;
const TABLE_COMMENT_WEIGHT: f64 = 4.0;
const COLUMN_COMMENT_WEIGHT: f64 = 4.0;
const COLUMN_NAME_WEIGHT: f64 = 3.0;
const PARTITION_WEIGHT: f64 = 3.0;
const PATH_WEIGHT: f64 = 1.0;

/// Default layer preference order
pub const DEFAULT_PREFER: [Layer; 3] = [Layer::Ads, Layer::Dws, Layer::Dwt];
/// Default number of hits returned
pub const DEFAULT_LIMIT: usize = 20;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9_.]+|[\x{4e00}-\x{9fff}]+").expect("token regex"))
}

fn ascii_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_.]+").expect("token part regex"))
}

/// Immutable keyword tables used by the tokenizer and the scorer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    stopwords: HashSet<String>,
    low_info: HashSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            stopwords: STOPWORDS_EN
                .iter()
                .chain(STOPWORDS_ZH.iter())
                .map(|s| s.to_string())
                .collect(),
            low_info: LOW_INFO_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Vocabulary {
    /// Built-in tables extended with extra stopwords
    pub fn with_extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords.extend(
            words
                .into_iter()
                .map(|w| normalize(w.as_ref()))
                .filter(|w| !w.is_empty()),
        );
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn is_low_info(&self, token: &str) -> bool {
        self.low_info.contains(token)
    }

    /// Split a free-text query into de-duplicated search tokens.
    ///
    /// ASCII runs also contribute their `_`/`.`-separated parts. Tokens
    /// shorter than two characters, stopwords and digit runs shorter than
    /// three are dropped.
    pub fn tokenize(&self, query: &str) -> Vec<String> {
        let normalized = normalize(query);
        let mut out: Vec<String> = Vec::new();
        let mut push = |token: &str| {
            if self.keeps(token) && !out.iter().any(|t| t == token) {
                out.push(token.to_string());
            }
        };

        for m in token_re().find_iter(&normalized) {
            let token = m.as_str();
            push(token);
            if token.is_ascii() {
                for part in ascii_part_re().split(token) {
                    if part != token {
                        push(part);
                    }
                }
            }
        }
        out
    }

    fn keeps(&self, token: &str) -> bool {
        if token.chars().count() < 2 || self.is_stopword(token) {
            return false;
        }
        !(token.len() < 3 && token.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Lowercase, fold fullwidth ASCII, and collapse everything that is not a
/// token character into single spaces
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().map(fold_fullwidth).flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.' || is_cjk(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

fn fold_fullwidth(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{ff01}'..='\u{ff5e}' => char::from_u32(c as u32 - 0xfee0).unwrap_or(c),
        _ => c,
    }
}

/// One retrieval request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Only entries of this layer are scored
    pub layer: Option<Layer>,
    /// Preferred layers, most preferred first
    pub prefer: Vec<Layer>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            layer: None,
            prefer: DEFAULT_PREFER.to_vec(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_layer(mut self, layer: Option<Layer>) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_prefer(mut self, prefer: Vec<Layer>) -> Self {
        self.prefer = prefer;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A ranked hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry<'a> {
    pub score: f64,
    #[serde(flatten)]
    pub entry: &'a SearchEntry,
}

/// Ranked hits plus the tokens that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults<'a> {
    pub tokens: Vec<String>,
    /// Number of hits before the limit was applied
    pub total: usize,
    pub hits: Vec<ScoredEntry<'a>>,
}

/// Scores search-index entries against tokenized queries
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    vocabulary: Vocabulary,
}

impl SearchEngine {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Rank the entries of `index` for `query`.
    ///
    /// Fails with [`CatalogError::EmptyQuery`] when tokenizing leaves
    /// nothing to search for.
    pub fn search<'a>(
        &self,
        index: &'a SearchIndex,
        query: &SearchQuery,
    ) -> Result<SearchResults<'a>, CatalogError> {
        let tokens = self.vocabulary.tokenize(&query.text);
        if tokens.is_empty() {
            return Err(CatalogError::EmptyQuery {
                query: query.text.clone(),
            });
        }
        debug!(?tokens, "search tokens");

        let mut hits: Vec<ScoredEntry<'a>> = index
            .tables
            .iter()
            .filter(|entry| query.layer.map_or(true, |layer| entry.layer == layer))
            .filter_map(|entry| {
                let score = self.score(entry, &tokens, &query.prefer);
                (score > 0.0).then_some(ScoredEntry { score, entry })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entry.layer.cmp(&b.entry.layer))
                .then_with(|| a.entry.name.cmp(&b.entry.name))
        });
        let total = hits.len();
        hits.truncate(query.limit);

        Ok(SearchResults {
            tokens,
            total,
            hits,
        })
    }

    /// Token score of one entry plus its layer preference bonus. The bonus
    /// only applies once some token matched, so preferred layers never
    /// surface on preference alone.
    pub fn score(&self, entry: &SearchEntry, tokens: &[String], prefer: &[Layer]) -> f64 {
        let haystack = Haystack::new(entry);
        let mut score = 0.0;
        for token in tokens {
            let weight = if self.vocabulary.is_low_info(token) {
                LOW_INFO_WEIGHT
            } else {
                1.0
            };
            score += weight * haystack.field_weight(token);
        }

        if score > 0.0 {
            if let Some(position) = prefer.iter().position(|layer| *layer == entry.layer) {
                score += 3usize.saturating_sub(position) as f64;
            }
        }
        score
    }
}

/// Lowercased searchable fields of one entry
struct Haystack {
    name: String,
    description: String,
    table_comment: String,
    column_comments: String,
    column_names: String,
    partitions: String,
    path: String,
}

impl Haystack {
    fn new(entry: &SearchEntry) -> Self {
        let lower = |value: &Option<String>| value.as_deref().unwrap_or_default().to_lowercase();
        Self {
            name: entry.name.to_lowercase(),
            description: lower(&entry.description),
            table_comment: lower(&entry.table_comment),
            column_comments: entry
                .columns
                .iter()
                .filter(|(_, comment)| !comment.is_empty())
                .map(|(_, comment)| comment.as_str())
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            column_names: entry
                .columns
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            partitions: entry.partition_columns.join(" ").to_lowercase(),
            path: lower(&entry.ddl_sql_file),
        }
    }

    fn field_weight(&self, token: &str) -> f64 {
        [
            (&self.name, NAME_WEIGHT),
            (&self.description, DESCRIPTION_WEIGHT),
            (&self.table_comment, TABLE_COMMENT_WEIGHT),
            (&self.column_comments, COLUMN_COMMENT_WEIGHT),
            (&self.column_names, COLUMN_NAME_WEIGHT),
            (&self.partitions, PARTITION_WEIGHT),
            (&self.path, PATH_WEIGHT),
        ]
        .iter()
        .filter(|(field, _)| field.contains(token))
        .map(|(_, weight)| weight)
        .sum()
    }
}
