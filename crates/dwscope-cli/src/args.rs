//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "dwscope")]
#[command(author, version, about = "Data-warehouse catalog builder, table search and SQL linter")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the nearest dwscope.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index a directory of DDL and documentation files
    Build {
        /// Directory to scan
        #[arg(long, value_name = "DIR")]
        root: PathBuf,

        /// Output directory (defaults to the scan root)
        #[arg(long = "out-dir", value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Per-file read limit in bytes
        #[arg(long = "max-bytes")]
        max_bytes: Option<u64>,

        /// Comma-separated file suffixes to index
        #[arg(long, value_delimiter = ',')]
        suffixes: Vec<String>,

        /// Keep tables whose layer could not be detected
        #[arg(long = "include-unknown")]
        include_unknown: bool,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Rank catalog tables for a free-text query
    Search {
        /// Search index written by `build`
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Keywords, Chinese and English mixed
        #[arg(long = "q", value_name = "TEXT")]
        query: String,

        /// Only return tables of this layer
        #[arg(long)]
        layer: Option<String>,

        /// Number of results
        #[arg(long)]
        top: Option<usize>,

        /// Comma-separated layer preference order
        #[arg(long, value_delimiter = ',')]
        prefer: Vec<String>,

        /// Output format (human or json; sarif is rejected)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Lint a candidate query (reads stdin when --sql is absent)
    Check {
        /// SQL file to check
        #[arg(long, value_name = "FILE")]
        sql: Option<PathBuf>,

        /// Search index used for partition checks
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Target dialect: hive, hive-legacy, sparksql, gaussdb
        #[arg(short, long)]
        dialect: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Finding codes to suppress
        #[arg(long, value_name = "CODE")]
        disable: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
    /// SARIF output (for GitHub Code Scanning); findings only
    Sarif,
}
