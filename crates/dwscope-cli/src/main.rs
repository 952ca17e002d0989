//! dwscope CLI - data-warehouse catalog builder, table search and SQL linter

mod args;
mod config;
mod output;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use dwscope_core::{CatalogBuilder, CatalogError, CatalogLookup, Linter, SearchEngine, SearchIndex, SearchQuery};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};
use crate::config::{parse_layer_filter, Config};
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(args) {
        Ok(user_error) => {
            if user_error {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

/// `RUST_LOG` wins over the -v/-q flags
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Report an invocation problem. Returns the value `run` hands back for it.
fn user_error(err: impl std::fmt::Display) -> bool {
    eprintln!("Error: {}", err);
    true
}

/// Split catalog errors into user errors (exit 1) and fatal ones (exit 2)
fn triage(err: CatalogError) -> Result<bool> {
    if err.is_user_error() {
        let report = miette::Report::new(err);
        eprintln!("Error: {:?}", report);
        Ok(true)
    } else {
        Err(err.into())
    }
}

fn run(args: Args) -> Result<bool> {
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return Ok(user_error(format!("invalid configuration: {:?}", e))),
    };

    match args.command {
        Command::Build {
            root,
            out_dir,
            max_bytes,
            suffixes,
            include_unknown,
            pretty,
        } => {
            let section = config.build.merge_with_args(
                &out_dir,
                max_bytes,
                &suffixes,
                include_unknown,
                pretty,
            );
            let out_dir = section
                .out_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| root.clone());

            let builder = CatalogBuilder::with_options(&root, section.build_options());
            let catalog = match builder.build() {
                Ok(catalog) => catalog,
                Err(err) => return triage(err),
            };

            let include_unknown = builder.options().include_unknown;
            let index_path = catalog
                .write_to(&out_dir, &root.display().to_string(), include_unknown, section.pretty)
                .map_err(miette::Report::new)?;

            if !args.quiet {
                output::print_build_summary(&catalog.summary(include_unknown), &index_path);
            }
            Ok(false)
        }

        Command::Search {
            catalog,
            query,
            layer,
            top,
            prefer,
            format,
        } => {
            let section = config.search.merge_with_args(top, &prefer, format);
            let layer = match parse_layer_filter(layer.as_deref()) {
                Ok(layer) => layer,
                Err(e) => return Ok(user_error(e)),
            };
            let prefer = match section.prefer_layers() {
                Ok(prefer) => prefer,
                Err(e) => return Ok(user_error(e)),
            };
            let output_format = match section.output_format() {
                Ok(format) => format,
                Err(e) => return Ok(user_error(e)),
            };

            if !catalog.is_file() {
                return Ok(user_error(format!(
                    "catalog not found: {} (run `dwscope build` first)",
                    catalog.display()
                )));
            }
            let index = SearchIndex::load(&catalog).map_err(miette::Report::new)?;

            let engine = SearchEngine::new(section.vocabulary());
            let search_query = SearchQuery::new(query)
                .with_layer(layer)
                .with_prefer(prefer)
                .with_limit(section.limit());
            let results = match engine.search(&index, &search_query) {
                Ok(results) => results,
                Err(err) => return triage(err),
            };

            output::print_search_results(output_format, &results, &catalog);
            Ok(false)
        }

        Command::Check {
            sql,
            catalog,
            dialect,
            format,
            disable,
        } => {
            let section = config.lint.merge_with_args(&dialect, format, &disable);
            let dialect = match section.dialect() {
                Ok(dialect) => dialect,
                Err(e) => return Ok(user_error(e)),
            };
            let lint_config = match section.lint_config() {
                Ok(lint_config) => lint_config,
                Err(e) => return Ok(user_error(e)),
            };

            let (source, file_name) = match &sql {
                Some(path) => match read_sql_file(path) {
                    Ok(source) => (source, path.display().to_string()),
                    Err(e) => return Ok(user_error(e)),
                },
                None => {
                    let mut bytes = Vec::new();
                    std::io::stdin().read_to_end(&mut bytes).into_diagnostic()?;
                    (decode_sql(&bytes), "<stdin>".to_string())
                }
            };
            if source.trim().is_empty() {
                return Ok(user_error("no SQL to check (empty input)"));
            }

            let lookup = catalog.as_deref().and_then(CatalogLookup::load);
            let linter = Linter::new(dialect)
                .with_config(lint_config)
                .with_catalog(lookup);
            let findings = linter.check(&source);
            tracing::info!(count = findings.len(), dialect = %dialect, "lint finished");

            OutputFormatter::new(section.output_format(), file_name).print_findings(&findings);
            Ok(false)
        }
    }
}

fn read_sql_file(path: &Path) -> std::result::Result<String, String> {
    fs::read(path)
        .map(|bytes| decode_sql(&bytes))
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

/// Undecodable bytes become U+FFFD; the query is still linted
fn decode_sql(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
