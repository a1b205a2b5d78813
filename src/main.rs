//! Marginalia main entry point
//!
//! This is the command-line interface for the Marginalia bookmark exporter.

use clap::Parser;
use marginalia::checkpoint::CheckpointStore;
use marginalia::config::{
    compute_resume_hash, default_config, load_config, validate_for_processing,
};
use marginalia::engine::{ProcessingEngine, RunMode};
use marginalia::fetch::HttpFetcher;
use marginalia::output::{
    generate_diagram, print_summary, FileSystemWriter, RunSummary,
};
use marginalia::summarize::LlmSummarizer;
use marginalia::tree::load_bookmarks;
use marginalia::{Config, ExportError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Marginalia: a bookmark export and summarization tool
///
/// Marginalia reads a Chrome bookmarks file, fetches each bookmarked page,
/// summarizes it with an LLM, and writes a markdown file hierarchy mirroring
/// the bookmark folders. Interrupted runs can be resumed from a checkpoint.
#[derive(Parser, Debug)]
#[command(name = "marginalia")]
#[command(version = "1.0.0")]
#[command(about = "Export and summarize browser bookmarks", long_about = None)]
struct Cli {
    /// Path to the Chrome Bookmarks JSON file
    #[arg(value_name = "BOOKMARKS")]
    bookmarks: PathBuf,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the output directory from the config
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Resume an interrupted run from its checkpoint
    #[arg(long, conflicts_with = "recheck_failed")]
    resume: bool,

    /// Re-attempt only the URLs the checkpoint records as failed
    #[arg(long, conflicts_with = "resume")]
    recheck_failed: bool,

    /// Override the checkpoint file path
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,

    /// Parse and traverse the bookmarks without fetching or writing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip generating the Mermaid structure diagram
    #[arg(long)]
    no_diagram: bool,

    /// Override the maximum concurrent page fetches
    #[arg(long, value_name = "N")]
    fetch_concurrency: Option<u32>,

    /// Override the maximum concurrent summarize calls
    #[arg(long, value_name = "N")]
    summarize_concurrency: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match load_config_for(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Loading bookmarks from: {}", cli.bookmarks.display());
    let root = load_bookmarks(&cli.bookmarks)?;
    let total = root.count_bookmarks();
    tracing::info!("Parsed {} bookmarks", total);

    if cli.dry_run {
        handle_dry_run(&config, &root);
        return Ok(());
    }

    validate_for_processing(&config)?;

    handle_run(&cli, config, root).await?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marginalia=info,warn"),
            1 => EnvFilter::new("marginalia=debug,info"),
            2 => EnvFilter::new("marginalia=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (or defaults) and applies CLI overrides
fn load_config_for(cli: &Cli) -> Result<Config, marginalia::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => default_config()?,
    };

    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.to_string_lossy().to_string();
    }
    if let Some(n) = cli.fetch_concurrency {
        config.fetch.max_concurrent = n;
    }
    if let Some(n) = cli.summarize_concurrency {
        config.summarize.max_concurrent = n;
    }
    if cli.no_diagram {
        config.output.generate_diagram = false;
    }

    Ok(config)
}

/// Handles --dry-run: report what a real run would do, touch nothing
fn handle_dry_run(config: &Config, root: &marginalia::BookmarkFolder) {
    println!("=== Marginalia Dry Run ===\n");

    println!("LLM:");
    println!("  Model: {}", config.llm.model);
    println!("  Max tokens: {}", config.llm.max_tokens);
    println!("  Rate limit: {}/min", config.llm.rate_limit);

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max concurrent: {}", config.fetch.max_concurrent);
    println!("  Retries: {}", config.fetch.retry_attempts);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.dir);
    println!("  Metadata: {}", config.output.include_metadata);
    println!("  Diagram: {}", config.output.generate_diagram);
    println!("  Save interval: {}", config.output.save_interval);

    let mut folders = 0usize;
    count_folders(root, &mut folders);
    println!("\nBookmarks:");
    println!("  Folders: {}", folders);
    println!("  Bookmarks: {}", root.count_bookmarks());

    println!("\n✓ Configuration is valid");
    println!("✓ Would process {} bookmarks", root.count_bookmarks());
}

fn count_folders(folder: &marginalia::BookmarkFolder, count: &mut usize) {
    for child in folder.folders() {
        *count += 1;
        count_folders(child, count);
    }
}

/// Opens or creates the checkpoint according to the selected mode
fn open_checkpoint(
    cli: &Cli,
    config: &Config,
) -> Result<(Arc<CheckpointStore>, RunMode), ExportError> {
    let path = cli
        .checkpoint
        .clone()
        .unwrap_or_else(|| Path::new(&config.output.dir).join("progress.json"));
    let source = cli.bookmarks.to_string_lossy().to_string();
    let hash = compute_resume_hash(config);

    let requested = if cli.recheck_failed {
        RunMode::RecheckFailed
    } else if cli.resume {
        RunMode::Resume
    } else {
        RunMode::Fresh
    };

    match requested {
        RunMode::Fresh => {
            if path.exists() {
                tracing::warn!(
                    "Overwriting existing checkpoint at {} (use --resume to continue it)",
                    path.display()
                );
            }
            Ok((Arc::new(CheckpointStore::create(path, source, hash)), requested))
        }
        RunMode::Resume | RunMode::RecheckFailed => {
            match CheckpointStore::load(&path, &source, &hash)? {
                Some(store) => Ok((Arc::new(store), requested)),
                None => {
                    tracing::warn!("No usable checkpoint found, starting fresh");
                    Ok((
                        Arc::new(CheckpointStore::create(path, source, hash)),
                        RunMode::Fresh,
                    ))
                }
            }
        }
    }
}

/// Handles the main processing run
async fn handle_run(
    cli: &Cli,
    config: Config,
    root: marginalia::BookmarkFolder,
) -> Result<(), Box<dyn std::error::Error>> {
    let (checkpoint, mode) = open_checkpoint(cli, &config)?;

    let writer = FileSystemWriter::new(&config.output.dir, config.output.include_metadata);
    writer.create_folder_structure(&root)?;

    if config.output.generate_diagram {
        let diagram = generate_diagram(&root);
        let diagram_path = Path::new(&config.output.dir).join("bookmarks_structure.md");
        std::fs::write(&diagram_path, diagram)?;
        tracing::info!("Wrote structure diagram to {}", diagram_path.display());
    }

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let summarizer = LlmSummarizer::new(
        config.llm.clone(),
        Path::new(&config.output.prompt_file),
    )?;

    let engine = ProcessingEngine::new(
        config,
        checkpoint.clone(),
        Arc::new(fetcher),
        Arc::new(summarizer),
        Arc::new(writer),
        mode,
    );

    // First Ctrl-C requests a graceful stop; a second one aborts
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight items...");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Second interrupt, aborting");
                std::process::exit(130);
            }
        }
    });

    let started = Instant::now();
    let result = engine.run(&root).await;
    let duration_secs = started.elapsed().as_secs();

    match result {
        Ok(outcome) => {
            let summary = RunSummary::from_statistics(
                &checkpoint.statistics(),
                outcome.interrupted,
                duration_secs,
            );
            print_summary(&summary);
            if mode != RunMode::Fresh {
                tracing::info!("Skipped {} already-processed items", outcome.skipped);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run halted: {}", e);
            Err(e.into())
        }
    }
}
