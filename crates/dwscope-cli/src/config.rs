//! Configuration file handling

use std::path::{Path, PathBuf};

use dwscope_core::extract::{DEFAULT_MAX_BYTES, DEFAULT_SUFFIXES};
use dwscope_core::lint::DEFAULT_MANY_JOINS_THRESHOLD;
use dwscope_core::search::{DEFAULT_LIMIT, DEFAULT_PREFER};
use dwscope_core::{BuildOptions, FindingKind, Layer, LintConfig, SqlDialect, Vocabulary};
use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

use crate::args::OutputFormat;

pub const CONFIG_FILE: &str = "dwscope.toml";

/// Configuration for dwscope
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub search: SearchConfig,
    pub lint: LintSection,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory; the scan root when unset
    pub out_dir: Option<String>,
    pub max_bytes: Option<u64>,
    /// File suffixes to index, e.g. [".sql", ".md"]
    pub suffixes: Vec<String>,
    pub include_unknown: bool,
    pub pretty: bool,
}

/// `[search]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Layer preference order, most preferred first
    pub prefer: Vec<String>,
    pub top: Option<usize>,
    /// Appended to the built-in stopword tables
    pub extra_stopwords: Vec<String>,
    /// Output format (human, json)
    pub format: Option<String>,
}

/// `[lint]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LintSection {
    /// Target dialect (hive, hive-legacy, sparksql, gaussdb)
    pub dialect: Option<String>,
    /// Finding codes to suppress (e.g., ["select-star"])
    pub disable: Vec<String>,
    pub many_joins_threshold: Option<usize>,
    /// Output format (human, json, sarif)
    pub format: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let config: Config = toml::from_str(&contents).into_diagnostic()?;
        Ok(config)
    }

    /// Try to find and load dwscope.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading config");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Explicit path if given, otherwise the nearest dwscope.toml, otherwise defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Ok(Self::find_and_load()?.unwrap_or_default()),
        }
    }
}

impl BuildConfig {
    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(
        mut self,
        out_dir: &Option<PathBuf>,
        max_bytes: Option<u64>,
        suffixes: &[String],
        include_unknown: bool,
        pretty: bool,
    ) -> Self {
        if let Some(dir) = out_dir {
            self.out_dir = Some(dir.display().to_string());
        }
        if max_bytes.is_some() {
            self.max_bytes = max_bytes;
        }
        if !suffixes.is_empty() {
            self.suffixes = suffixes.to_vec();
        }
        self.include_unknown |= include_unknown;
        self.pretty |= pretty;
        self
    }

    pub fn build_options(&self) -> BuildOptions {
        let options = BuildOptions {
            max_bytes: self.max_bytes.unwrap_or(DEFAULT_MAX_BYTES),
            include_unknown: self.include_unknown,
            ..Default::default()
        };
        if self.suffixes.is_empty() {
            options.with_suffixes(DEFAULT_SUFFIXES)
        } else {
            options.with_suffixes(&self.suffixes)
        }
    }
}

impl SearchConfig {
    pub fn merge_with_args(
        mut self,
        top: Option<usize>,
        prefer: &[String],
        format: Option<OutputFormat>,
    ) -> Self {
        if top.is_some() {
            self.top = top;
        }
        if !prefer.is_empty() {
            self.prefer = prefer.to_vec();
        }
        if let Some(fmt) = format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }
        self
    }

    pub fn limit(&self) -> usize {
        self.top.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn prefer_layers(&self) -> Result<Vec<Layer>> {
        if self.prefer.is_empty() {
            return Ok(DEFAULT_PREFER.to_vec());
        }
        parse_layers(&self.prefer)
    }

    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::default().with_extra_stopwords(&self.extra_stopwords)
    }

    /// Search results have no SARIF rendering
    pub fn output_format(&self) -> Result<OutputFormat> {
        match parse_format(self.format.as_deref()) {
            OutputFormat::Sarif => Err(miette::miette!(
                "sarif output is only available for `check`; use human or json for `search`"
            )),
            format => Ok(format),
        }
    }
}

impl LintSection {
    pub fn merge_with_args(
        mut self,
        dialect: &Option<String>,
        format: Option<OutputFormat>,
        disable: &[String],
    ) -> Self {
        if dialect.is_some() {
            self.dialect = dialect.clone();
        }
        if let Some(fmt) = format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }
        if !disable.is_empty() {
            self.disable = disable.to_vec();
        }
        self
    }

    pub fn dialect(&self) -> Result<SqlDialect> {
        match &self.dialect {
            Some(name) => name.parse().map_err(|e: String| miette::miette!(e)),
            None => Ok(SqlDialect::default()),
        }
    }

    pub fn lint_config(&self) -> Result<LintConfig> {
        let disabled = self
            .disable
            .iter()
            .map(|code| {
                FindingKind::from_code(code.trim()).ok_or_else(|| {
                    let known: Vec<_> = FindingKind::ALL.iter().map(|k| k.code()).collect();
                    miette::miette!(
                        "Unknown finding code: '{}'. Known codes: {}.",
                        code,
                        known.join(", ")
                    )
                })
            })
            .collect::<Result<_>>()?;

        Ok(LintConfig {
            many_joins_threshold: self
                .many_joins_threshold
                .unwrap_or(DEFAULT_MANY_JOINS_THRESHOLD),
            disabled,
        })
    }

    pub fn output_format(&self) -> OutputFormat {
        parse_format(self.format.as_deref())
    }
}

fn parse_layers(names: &[String]) -> Result<Vec<Layer>> {
    names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.parse::<Layer>().map_err(|e| miette::miette!(e)))
        .collect()
}

/// Parse an optional `--layer` value; an empty string means no filter
pub fn parse_layer_filter(layer: Option<&str>) -> Result<Option<Layer>> {
    match layer.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(|e: String| miette::miette!(e)),
    }
}

fn parse_format(format: Option<&str>) -> OutputFormat {
    match format {
        Some("json") => OutputFormat::Json,
        Some("sarif") => OutputFormat::Sarif,
        _ => OutputFormat::Human,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
            [build]
            max_bytes = 1000
            suffixes = ["sql"]

            [search]
            prefer = ["DWS", "ads"]
            extra_stopwords = ["口径"]

            [lint]
            dialect = "gaussdb"
            disable = ["select-star"]
            "#,
        )
        .unwrap();

        let options = config.build.build_options();
        assert_eq!(options.max_bytes, 1000);
        assert_eq!(options.suffixes, vec![".sql"]);
        assert_eq!(
            config.search.prefer_layers().unwrap(),
            vec![Layer::Dws, Layer::Ads]
        );
        assert_eq!(config.lint.dialect().unwrap(), SqlDialect::GaussDb);
        assert!(config
            .lint
            .lint_config()
            .unwrap()
            .disabled
            .contains(&FindingKind::SelectStar));
        assert!(config.search.vocabulary().is_stopword("口径"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.build.build_options(), BuildOptions::default());
        assert_eq!(config.search.limit(), 20);
        assert_eq!(config.search.prefer_layers().unwrap(), DEFAULT_PREFER.to_vec());
        assert_eq!(config.lint.dialect().unwrap(), SqlDialect::Hive);
        assert_eq!(config.lint.lint_config().unwrap(), LintConfig::default());
    }

    #[test]
    fn test_cli_args_take_precedence() {
        let section = LintSection {
            dialect: Some("hive".into()),
            disable: vec!["many-joins".into()],
            format: Some("json".into()),
            ..Default::default()
        }
        .merge_with_args(&Some("sparksql".into()), None, &[]);
        assert_eq!(section.dialect().unwrap(), SqlDialect::SparkSql);
        assert_eq!(section.output_format(), OutputFormat::Json);
        assert_eq!(section.disable, vec!["many-joins"]);

        let search = SearchConfig::default().merge_with_args(Some(5), &[], Some(OutputFormat::Json));
        assert_eq!(search.limit(), 5);
        assert_eq!(search.output_format().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn test_unknown_code_and_layer_rejected() {
        let section = LintSection {
            disable: vec!["no-such-rule".into()],
            ..Default::default()
        };
        assert!(section.lint_config().is_err());

        let search = SearchConfig::default().merge_with_args(None, &[], Some(OutputFormat::Sarif));
        assert!(search.output_format().is_err());
        let from_file = SearchConfig {
            format: Some("sarif".into()),
            ..Default::default()
        };
        assert!(from_file.output_format().is_err());
        assert!(parse_layer_filter(Some("DIM")).is_err());
        assert_eq!(parse_layer_filter(Some(" ")).unwrap(), None);
        assert_eq!(parse_layer_filter(Some("dws")).unwrap(), Some(Layer::Dws));
    }
}
