//! Catalog data model

use serde::{Deserialize, Serialize};

/// Data-warehouse layer, derived from directory naming.
///
/// Variants are declared in alphabetical order of their tags so that the
/// derived `Ord` matches sorting by tag string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layer {
    Ads,
    Dwd,
    Dws,
    Dwt,
    Ods,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Layer {
    pub const KNOWN: [Layer; 5] = [Layer::Ads, Layer::Dws, Layer::Dwt, Layer::Dwd, Layer::Ods];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Ads => "ADS",
            Layer::Dwd => "DWD",
            Layer::Dws => "DWS",
            Layer::Dwt => "DWT",
            Layer::Ods => "ODS",
            Layer::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Layer::Unknown
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADS" => Ok(Layer::Ads),
            "DWD" => Ok(Layer::Dwd),
            "DWS" => Ok(Layer::Dws),
            "DWT" => Ok(Layer::Dwt),
            "ODS" => Ok(Layer::Ods),
            "UNKNOWN" => Ok(Layer::Unknown),
            _ => Err(format!(
                "Unknown layer: '{}'. Supported layers: ADS, DWS, DWT, DWD, ODS.",
                s
            )),
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column recovered from DDL, in order of discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.is_empty()).then_some(comment);
        self
    }
}

/// Files that contributed to a table entry, relative to the scan root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFiles {
    pub sql_files: Vec<String>,
    pub doc_files: Vec<String>,
}

/// Data-flow facts derived from a table's SQL.
///
/// Serialized in compacted form: empty lists and `false` flags are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageSignals {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_tables: Vec<String>,
    #[serde(default, rename = "groupBy", skip_serializing_if = "Vec::is_empty")]
    pub group_by_exprs: Vec<String>,
    #[serde(
        default,
        rename = "rowNumberPartitionBy",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub row_number_partition_exprs: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_select_distinct: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_row_number: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LineageSignals {
    /// True when the compacted form would have no keys at all
    pub fn is_empty(&self) -> bool {
        self.insert_targets.is_empty()
            && self.source_tables.is_empty()
            && self.group_by_exprs.is_empty()
            && self.row_number_partition_exprs.is_empty()
            && !self.has_select_distinct
            && !self.has_row_number
    }

    /// Union lists (first-seen order, no duplicates) and OR the flags
    pub fn absorb(&mut self, other: &LineageSignals) {
        extend_unique(&mut self.insert_targets, &other.insert_targets);
        extend_unique(&mut self.source_tables, &other.source_tables);
        extend_unique(&mut self.group_by_exprs, &other.group_by_exprs);
        extend_unique(
            &mut self.row_number_partition_exprs,
            &other.row_number_partition_exprs,
        );
        self.has_select_distinct |= other.has_select_distinct;
        self.has_row_number |= other.has_row_number;
    }
}

pub(crate) fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        push_unique(target, item);
    }
}

pub(crate) fn push_unique(target: &mut Vec<String>, item: &str) {
    if !target.iter().any(|existing| existing == item) {
        target.push(item.to_string());
    }
}

/// One table in the catalog, keyed by `(layer, name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    pub layer: Layer,
    pub name: String,
    pub description: Option<String>,
    pub table_comment: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub partition_columns: Vec<ColumnSpec>,
    pub source_files: SourceFiles,
    pub signals: LineageSignals,
}

impl TableEntry {
    pub fn new(layer: Layer, name: impl Into<String>) -> Self {
        Self {
            layer,
            name: name.into(),
            description: None,
            table_comment: None,
            columns: Vec::new(),
            partition_columns: Vec::new(),
            source_files: SourceFiles::default(),
            signals: LineageSignals::default(),
        }
    }

    /// Stable identifier, `"<LAYER>|<name>"`
    pub fn id(&self) -> String {
        format!("{}|{}", self.layer, self.name)
    }

    /// Last dotted segment of the name
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Last dotted segment of a possibly qualified table name
pub fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_order_matches_tag_order() {
        let mut layers = vec![
            Layer::Unknown,
            Layer::Ods,
            Layer::Dwt,
            Layer::Ads,
            Layer::Dws,
            Layer::Dwd,
        ];
        layers.sort();
        let tags: Vec<_> = layers.iter().map(Layer::as_str).collect();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
    }

    #[test]
    fn test_layer_parse() {
        assert_eq!("ads".parse::<Layer>(), Ok(Layer::Ads));
        assert_eq!(" Dwd ".parse::<Layer>(), Ok(Layer::Dwd));
        assert!("dim".parse::<Layer>().is_err());
    }

    #[test]
    fn test_layer_deserialize_unknown_tag() {
        let layer: Layer = serde_json::from_str("\"DIM\"").unwrap();
        assert_eq!(layer, Layer::Unknown);
    }

    #[test]
    fn test_signals_absorb_dedups_and_ors() {
        let mut base = LineageSignals {
            source_tables: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let incoming = LineageSignals {
            source_tables: vec!["b".into(), "c".into()],
            has_row_number: true,
            ..Default::default()
        };
        base.absorb(&incoming);
        assert_eq!(base.source_tables, vec!["a", "b", "c"]);
        assert!(base.has_row_number);
        assert!(!base.has_select_distinct);
    }

    #[test]
    fn test_signals_compact_serialization() {
        let signals = LineageSignals {
            group_by_exprs: vec!["dt".into()],
            has_select_distinct: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&signals).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"groupBy": ["dt"], "hasSelectDistinct": true})
        );
        assert!(LineageSignals::default().is_empty());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("db.t"), "t");
        assert_eq!(short_name("t"), "t");
        assert_eq!(short_name("a.b.c"), "c");
    }
}
