//! # wiki-migrate CLI (`wikimig`)
//!
//! Migrates the legacy wiki database into the file-based content trees.
//!
//! ## Usage
//!
//! ```bash
//! wikimig --config ./config/wikimig.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wikimig run` | Full migration: history, redirects and translations per locale |
//! | `wikimig redirects` | Resolve redirects only and print or write them |
//! | `wikimig contributions` | CSV of every revision's author, collapsed per document |
//! | `wikimig count` | Number of documents per locale |
//! | `wikimig schema` | Create the legacy tables in an empty database |
//!
//! Diagnostics go to stderr through `tracing` (`RUST_LOG`, default `info`);
//! summaries and the contributions CSV go to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wiki_migrate::config::{self, Config};
use wiki_migrate::output::OutputWriter;
use wiki_migrate::source::SqliteSource;
use wiki_migrate::{contributions, db, pipeline, schema, stats};

#[derive(Parser)]
#[command(
    name = "wikimig",
    about = "Migrate the legacy wiki database into per-locale content files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wikimig.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[migration]` section.
#[derive(clap::Args, Clone, Default)]
struct MigrationArgs {
    /// Only migrate these locales (repeatable). Replaces the configured list.
    #[arg(long = "locale")]
    locales: Vec<String>,

    /// Skip documents whose slug (or parent slug) starts with this prefix
    /// (repeatable). Replaces the configured list.
    #[arg(long = "exclude-prefix")]
    exclude_prefixes: Vec<String>,

    /// Treat any existing output file or duplicate document path as fatal.
    #[arg(long)]
    start_clean: bool,

    /// Ceiling on concurrently processed documents.
    #[arg(long)]
    max_open_files: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full migration.
    Run {
        #[command(flatten)]
        args: MigrationArgs,
    },

    /// Resolve redirects without processing documents.
    ///
    /// Prints `from<TAB>to` lines to stdout unless `--write` is given.
    Redirects {
        #[command(flatten)]
        args: MigrationArgs,

        /// Write `_redirects.txt` files into the content trees.
        #[arg(long)]
        write: bool,
    },

    /// Dump one CSV record per revision author to stdout.
    ///
    /// Consecutive revisions of a document by the same user collapse into
    /// one record.
    Contributions {
        #[command(flatten)]
        args: MigrationArgs,

        /// Write the CSV to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Count documents per locale.
    Count {
        #[command(flatten)]
        args: MigrationArgs,
    },

    /// Create the legacy schema. Idempotent.
    Schema,
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn apply(mut cfg: Config, args: MigrationArgs) -> Result<Config> {
    if !args.locales.is_empty() {
        cfg.migration.locales = args.locales;
    }
    if !args.exclude_prefixes.is_empty() {
        cfg.migration.exclude_prefixes = args.exclude_prefixes;
    }
    if args.start_clean {
        cfg.migration.start_clean = true;
    }
    if let Some(n) = args.max_open_files {
        cfg.migration.max_open_files = n;
    }
    config::validate(&mut cfg)?;
    Ok(cfg)
}

async fn open_source(cfg: &Config) -> Result<SqliteSource> {
    let pool = db::connect(cfg).await?;
    Ok(SqliteSource::new(
        pool,
        cfg.migration.filter(),
        cfg.migration.max_open_files,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run { args } => {
            let cfg = apply(cfg, args)?;
            let source = open_source(&cfg).await?;
            let report = pipeline::run_migration(&cfg, &source).await?;
            println!("{}", report);
        }
        Commands::Redirects { args, write } => {
            let cfg = apply(cfg, args)?;
            let source = open_source(&cfg).await?;
            let map = pipeline::resolve_redirects(&cfg, &source).await?;
            if write {
                let files = OutputWriter::new(&cfg.output, cfg.migration.start_clean)
                    .write_redirects(&map)?;
                println!("Wrote {} redirect file(s).", files);
            } else {
                for pairs in map.values() {
                    for (from, to) in pairs {
                        println!("{}\t{}", from, to);
                    }
                }
            }
        }
        Commands::Contributions { args, output } => {
            let cfg = apply(cfg, args)?;
            let source = open_source(&cfg).await?;
            let out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => Box::new(io::stdout().lock()),
            };
            let summary = contributions::export_contributions(&cfg.migration, &source, out).await?;
            if let Some(path) = output {
                println!(
                    "Wrote {} contribution record(s) to {}.",
                    summary.written,
                    path.display()
                );
            }
        }
        Commands::Count { args } => {
            let cfg = apply(cfg, args)?;
            let source = open_source(&cfg).await?;
            let summary = stats::count_documents(&source).await?;
            stats::print_counts(&summary);
        }
        Commands::Schema => {
            schema::run_schema(&cfg).await?;
            println!("Legacy schema created at {}.", cfg.db.path.display());
        }
    }

    Ok(())
}
