//! Error and finding types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that abort a catalog build, search or lint run.
///
/// Content-level problems (malformed DDL, undecodable bytes, an unreadable
/// catalog in the linter) never surface here; they degrade instead.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CatalogError {
    #[error("root directory does not exist: {}", path.display())]
    #[diagnostic(code(dwscope::root_not_found))]
    RootNotFound { path: PathBuf },

    #[error("root is not a directory: {}", path.display())]
    #[diagnostic(code(dwscope::not_a_directory))]
    NotADirectory { path: PathBuf },

    #[error("i/o error on {}: {source}", path.display())]
    #[diagnostic(code(dwscope::io))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("walk error: {source}")]
    #[diagnostic(code(dwscope::walk))]
    Walk { source: walkdir::Error },

    #[error("invalid catalog json in {}: {source}", path.display())]
    #[diagnostic(code(dwscope::json))]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no searchable keywords left in query '{query}'")]
    #[diagnostic(
        code(dwscope::empty_query),
        help("every token was a stopword or too short; try business terms or table-name fragments")
    )]
    EmptyQuery { query: String },
}

impl CatalogError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Errors caused by bad invocation rather than by the environment
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::RootNotFound { .. } | Self::NotADirectory { .. } | Self::EmptyQuery { .. }
        )
    }
}

impl From<walkdir::Error> for CatalogError {
    fn from(source: walkdir::Error) -> Self {
        Self::Walk { source }
    }
}

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Advisory finding produced by the linter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "code")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Finding {
    pub fn warning(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Get the finding code string (e.g., "select-star")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Kinds of lint findings. The code strings are stable and documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// Statement is not read-only
    Destructive,
    /// `select *` projection
    SelectStar,
    /// Partitioned table queried without any WHERE clause
    MissingWhere,
    /// Partitioned table queried without filtering on a partition column
    MissingPartitionFilter,
    /// Backtick identifiers under GaussDB
    GaussdbBackticks,
    /// Hive/Spark-only syntax under GaussDB
    GaussdbHiveOnly,
    /// `::` cast under Hive or SparkSQL
    HivePostgresCast,
    /// `::` cast under legacy Hive
    HiveLegacyPostgresCast,
    /// Many joins without a ROW_NUMBER dedup
    ManyJoins,
    /// ORDER BY references a column missing from the projection
    HiveOrderbyNotSelected,
    /// Scalar subquery inside the projection list
    HiveLegacyScalarSubquerySelect,
    /// Subquery inside a JOIN ... ON predicate
    HiveLegacyScalarSubqueryOn,
}

impl FindingKind {
    pub const ALL: [FindingKind; 12] = [
        FindingKind::Destructive,
        FindingKind::SelectStar,
        FindingKind::MissingWhere,
        FindingKind::MissingPartitionFilter,
        FindingKind::GaussdbBackticks,
        FindingKind::GaussdbHiveOnly,
        FindingKind::HivePostgresCast,
        FindingKind::HiveLegacyPostgresCast,
        FindingKind::ManyJoins,
        FindingKind::HiveOrderbyNotSelected,
        FindingKind::HiveLegacyScalarSubquerySelect,
        FindingKind::HiveLegacyScalarSubqueryOn,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            FindingKind::Destructive => "destructive",
            FindingKind::SelectStar => "select-star",
            FindingKind::MissingWhere => "missing-where",
            FindingKind::MissingPartitionFilter => "missing-partition-filter",
            FindingKind::GaussdbBackticks => "gaussdb-backticks",
            FindingKind::GaussdbHiveOnly => "gaussdb-hive-only",
            FindingKind::HivePostgresCast => "hive-postgres-cast",
            FindingKind::HiveLegacyPostgresCast => "hive-legacy-postgres-cast",
            FindingKind::ManyJoins => "many-joins",
            FindingKind::HiveOrderbyNotSelected => "hive-orderby-not-selected",
            FindingKind::HiveLegacyScalarSubquerySelect => "hive-legacy-scalar-subquery-select",
            FindingKind::HiveLegacyScalarSubqueryOn => "hive-legacy-scalar-subquery-on",
        }
    }

    /// Look up a kind by its code string
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
