//! SQL dialect support

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FindingKind;

/// Target dialects the linter knows quirks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SqlDialect {
    #[default]
    Hive,
    HiveLegacy,
    #[serde(rename = "sparksql")]
    SparkSql,
    #[serde(rename = "gaussdb")]
    GaussDb,
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 4] = [
        SqlDialect::Hive,
        SqlDialect::HiveLegacy,
        SqlDialect::SparkSql,
        SqlDialect::GaussDb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Hive => "hive",
            SqlDialect::HiveLegacy => "hive-legacy",
            SqlDialect::SparkSql => "sparksql",
            SqlDialect::GaussDb => "gaussdb",
        }
    }

    /// Finding raised for a Postgres-style `::` cast, if this dialect
    /// rejects it
    pub fn postgres_cast_finding(&self) -> Option<FindingKind> {
        match self {
            SqlDialect::Hive | SqlDialect::SparkSql => Some(FindingKind::HivePostgresCast),
            SqlDialect::HiveLegacy => Some(FindingKind::HiveLegacyPostgresCast),
            SqlDialect::GaussDb => None,
        }
    }

    /// Whether `ORDER BY` may only reference projected columns
    pub fn requires_selected_order_by(&self) -> bool {
        matches!(self, SqlDialect::Hive | SqlDialect::HiveLegacy)
    }

    /// Whether scalar subqueries in projections and join predicates are
    /// rejected
    pub fn rejects_scalar_subqueries(&self) -> bool {
        *self == SqlDialect::HiveLegacy
    }

    pub fn is_gaussdb(&self) -> bool {
        *self == SqlDialect::GaussDb
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hive" => Ok(SqlDialect::Hive),
            "hive-legacy" | "hive_legacy" => Ok(SqlDialect::HiveLegacy),
            "sparksql" | "spark" | "spark-sql" => Ok(SqlDialect::SparkSql),
            "gaussdb" | "gauss" => Ok(SqlDialect::GaussDb),
            _ => Err(format!(
                "Unknown dialect: '{}'. Supported dialects: hive, hive-legacy, sparksql, gaussdb.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_agree() {
        for dialect in SqlDialect::ALL {
            assert_eq!(dialect.to_string().parse::<SqlDialect>(), Ok(dialect));
        }
        assert_eq!("Spark".parse::<SqlDialect>(), Ok(SqlDialect::SparkSql));
        assert!("postgresql".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_serde_tags_match_display() {
        for dialect in SqlDialect::ALL {
            let json = serde_json::to_string(&dialect).unwrap();
            assert_eq!(json, format!("\"{}\"", dialect));
        }
    }

    #[test]
    fn test_cast_findings() {
        assert_eq!(
            SqlDialect::SparkSql.postgres_cast_finding(),
            Some(FindingKind::HivePostgresCast)
        );
        assert_eq!(
            SqlDialect::HiveLegacy.postgres_cast_finding(),
            Some(FindingKind::HiveLegacyPostgresCast)
        );
        assert_eq!(SqlDialect::GaussDb.postgres_cast_finding(), None);
    }
}
