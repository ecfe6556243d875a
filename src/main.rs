//! dirindexer - keep a full-text index in sync with a directory
//!
//! Entry point for the command-line tool.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::signal;
use walkdir::WalkDir;

use dirindexer::config::{default_concurrency, DEFAULT_FLUSH_DELAY, DEFAULT_INDEX_DIR};
use dirindexer::observability::init_tracing;
use dirindexer::storage::{
    nanos_to_datetime, IndexEngine, IndexReader, SearchHit, SqliteIndex, INDEX_FILE,
};
use dirindexer::sync::{FilterConfig, IndexSyncer, SyncReport};
use dirindexer::watcher::run_daemon;
use dirindexer::Config;

const GREEN: &str = "\x1b[1;32m";
const HIGHLIGHT: &str = "\x1b[1;43m";
const RESET: &str = "\x1b[1;m";

/// Index a directory or search it for keywords.
#[derive(Parser, Debug)]
#[command(name = "dirindexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the index
    #[arg(long, global = true, env = "DIRINDEXER_INDEX_DIR", default_value = DEFAULT_INDEX_DIR)]
    index_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRINDEXER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, global = true, env = "DIRINDEXER_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a given directory for future searches
    Index(SyncArgs),
    /// Update the index with new or edited files
    Update(SyncArgs),
    /// Watch a directory and keep the index current until interrupted
    Daemon(DaemonArgs),
    /// Search the indexed directory for a keyword
    Search(SearchArgs),
    /// Delete the current index
    Clear,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// The directory to index
    directory: PathBuf,

    /// Exclude specified file extensions
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Only index the specified file extensions
    #[arg(short, long, value_delimiter = ',')]
    include: Vec<String>,

    /// Number of files to load in parallel
    #[arg(short, long, env = "DIRINDEXER_PROCESSORS")]
    processors: Option<usize>,

    /// Include hidden files and folders
    #[arg(short, long)]
    all: bool,
}

#[derive(Args, Debug)]
struct DaemonArgs {
    #[command(flatten)]
    sync: SyncArgs,

    /// Seconds between index commits
    #[arg(long, env = "DIRINDEXER_FLUSH_DELAY", value_parser = parse_seconds)]
    flush_delay: Option<Duration>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// The search terms
    #[arg(required = true)]
    keywords: Vec<String>,

    /// Number of results to show (all when omitted)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Highlight the search terms
    #[arg(short, long, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::stdout().is_terminal(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    tracing::debug!(
        "dirindexer v{} starting, index in {:?}",
        env!("CARGO_PKG_VERSION"),
        cli.index_dir
    );

    match cli.command {
        Command::Index(args) => {
            let config = build_config(&cli.index_dir, &cli.log_level, &args, None)?;
            let engine = SqliteIndex::open_or_create(&config.index_dir)?;
            let report = IndexSyncer::from_config(&engine, &config)
                .run_full_index(&config.root)
                .await?;
            engine.close()?;
            print_report("Indexed", &report);
        }
        Command::Update(args) => {
            let config = build_config(&cli.index_dir, &cli.log_level, &args, None)?;
            let engine = SqliteIndex::open_or_create(&config.index_dir)?;
            let report = IndexSyncer::from_config(&engine, &config)
                .run_update(&config.root)
                .await?;
            engine.close()?;
            print_report("Updated", &report);
        }
        Command::Daemon(args) => {
            let config =
                build_config(&cli.index_dir, &cli.log_level, &args.sync, args.flush_delay)?;
            let engine = SqliteIndex::open_or_create(&config.index_dir)?;
            let stats = run_daemon(&config, engine, shutdown_signal()).await?;
            println!(
                "Processed {} events in {} commits",
                stats.events_received, stats.commits
            );
        }
        Command::Search(args) => search(&cli.index_dir, &args)?,
        Command::Clear => clear(&cli.index_dir)?,
    }

    Ok(())
}

fn build_config(
    index_dir: &Path,
    log_level: &str,
    args: &SyncArgs,
    flush_delay: Option<Duration>,
) -> anyhow::Result<Config> {
    let config = Config {
        root: args.directory.clone(),
        index_dir: index_dir.to_path_buf(),
        filter: FilterConfig::new(args.all, args.exclude.as_slice(), args.include.as_slice())?,
        concurrency: args.processors.unwrap_or_else(default_concurrency),
        flush_delay: flush_delay.unwrap_or(DEFAULT_FLUSH_DELAY),
        log_level: log_level.to_string(),
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    Ok(config)
}

fn print_report(verb: &str, report: &SyncReport) {
    println!(
        "{verb} {} files ({} added, {} changed, {} removed, {} unreadable)",
        report.indexed, report.added, report.changed, report.removed, report.failed
    );
}

fn search(index_dir: &Path, args: &SearchArgs) -> anyhow::Result<()> {
    if !index_dir.join(INDEX_FILE).exists() {
        bail!(
            "no index found in {}; run `dirindexer index <DIRECTORY>` first",
            index_dir.display()
        );
    }

    let engine = SqliteIndex::open_or_create(index_dir)?;
    let query = args.keywords.join(" ");
    let hits = engine.reader()?.search(&query, args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    let color = args.color.enabled();
    println!("{} results for {query:?}", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i, hit, color);
    }

    Ok(())
}

fn print_hit(i: usize, hit: &SearchHit, color: bool) {
    let modified = nanos_to_datetime(hit.last_modified).format("%Y-%m-%d %H:%M:%S");

    if color {
        println!("Result {i}: {GREEN}{}{RESET}", hit.path);
    } else {
        println!("Result {i}: {}", hit.path);
    }
    println!("  modified {modified} UTC, score {:.3}", hit.score);

    let snippet = if color {
        hit.marked_snippet(HIGHLIGHT, RESET)
    } else {
        hit.marked_snippet("", "")
    };
    println!("{snippet}\n");
}

fn clear(index_dir: &Path) -> anyhow::Result<()> {
    if !index_dir.exists() {
        println!("No index at {}", index_dir.display());
        return Ok(());
    }

    println!("Deleting the current index...");
    for entry in WalkDir::new(index_dir).min_depth(1).contents_first(true) {
        let entry = entry.context("failed to walk index directory")?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        } else {
            println!("{}", entry.file_name().to_string_lossy());
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }

    std::fs::remove_dir(index_dir)
        .with_context(|| format!("failed to remove {}", index_dir.display()))?;
    tracing::info!(path = %index_dir.display(), "Index cleared");

    Ok(())
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid number of seconds: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration: {e}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
