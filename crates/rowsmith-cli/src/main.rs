use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rowsmith_core::{Error as CoreError, TableSchema, validate_tables};
use rowsmith_generate::{GenerateOptions, GenerationEngine, GenerationError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("schema error: {0}")]
    Schema(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("failed to parse {}: {}", path.display(), source)]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rowsmith", version, about = "Rowsmith fixture generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate CSV fixtures from a directory of table schemas.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Directory containing per-table YAML schema files.
    #[arg(long, default_value = "schema")]
    schema_dir: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,
    /// Seed for deterministic generation.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Retry budget per unique value.
    #[arg(long, default_value_t = 50)]
    max_unique_attempts: u32,
}

fn main() -> Result<(), CliError> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let tables = load_schemas(&args.schema_dir)?;
    validate_tables(&tables)?;

    let options = GenerateOptions {
        out_dir: args.out_dir,
        seed: args.seed,
        max_unique_attempts: args.max_unique_attempts,
    };
    let engine = GenerationEngine::new(options);
    let result = engine.run(&tables)?;

    let rows_total: u64 = result
        .report
        .tables
        .iter()
        .map(|table| table.rows_generated)
        .sum();
    println!(
        "generated {} tables ({} rows) in {}",
        result.report.tables.len(),
        rows_total,
        result.run_dir.display()
    );
    Ok(())
}

/// Load every `*.yaml` / `*.yml` file under `dir`, one table per file.
///
/// Files load in lexicographic order; the order only breaks ties in the
/// generation order, never correctness, so schema authors are free to
/// name files however they like.
fn load_schemas(dir: &Path) -> Result<Vec<TableSchema>, CliError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CliError::InvalidConfig(format!(
            "no schema files found in {}",
            dir.display()
        )));
    }

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        let table: TableSchema =
            serde_yaml::from_str(&contents).map_err(|source| CliError::Parse {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(table = %table.name, path = %path.display(), "loaded table schema");
        tables.push(table);
    }
    Ok(tables)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
