//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the catalog crawl-and-extract
//! pipeline.

use catalog_sweep::config::{load_config_with_hash, Config, ExtractionStrategy};
use catalog_sweep::crawler::{Orchestrator, RunMode, StaticFetcher};
use catalog_sweep::output::print_statistics;
use catalog_sweep::render::HttpRenderer;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file used when neither the command line nor a profile names one
const DEFAULT_LOG_FILE: &str = "catalog-sweep.log";

/// Catalog-Sweep: a resilient crawl-and-extract pipeline for product catalogs
///
/// Each PROFILE is a TOML site profile. Profiles run one after another with
/// the same run mode.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version)]
#[command(about = "Crawl product catalogs into CSV", long_about = None)]
struct Cli {
    /// Site profiles to run, in order
    #[arg(value_name = "PROFILE", required = true)]
    profiles: Vec<PathBuf>,

    /// Run mode: 1 = links then details, 2 = links only, 3 = details only
    #[arg(short, long, value_name = "N")]
    option: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error console output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Continue an interrupted run from its checkpoint
    #[arg(long)]
    resume: bool,

    /// Validate the profiles and show what would run, without fetching
    #[arg(long)]
    dry_run: bool,

    /// Append the durable log here instead of the profile's log path
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Profiles are loaded first so the first one can name the log file
    let loaded: Vec<_> = cli
        .profiles
        .iter()
        .map(|path| (path, load_config_with_hash(path)))
        .collect();

    let log_path = cli.log_file.clone().unwrap_or_else(|| {
        loaded
            .iter()
            .find_map(|(_, result)| result.as_ref().ok())
            .and_then(|(config, _)| config.output.log_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    });
    let _guard = setup_logging(cli.verbose, cli.quiet, &log_path)?;

    let mut profiles = Vec::new();
    for (path, result) in loaded {
        match result {
            Ok((config, hash)) => {
                tracing::info!(
                    "Loaded profile {} from {} (hash: {})",
                    config.site.name,
                    path.display(),
                    hash
                );
                profiles.push((config, hash));
            }
            Err(e) => {
                tracing::error!("Failed to load profile {}: {}", path.display(), e);
                return Err(e.into());
            }
        }
    }

    if cli.dry_run {
        for (config, _) in &profiles {
            handle_dry_run(config);
        }
        return Ok(());
    }

    let choice = match cli.option {
        Some(choice) => choice,
        None => prompt_menu()?,
    };
    let Some(mode) = RunMode::from_menu(&choice) else {
        println!("Invalid option '{}'. Choose 1, 2 or 3.", choice.trim());
        return Ok(());
    };

    for (config, hash) in profiles {
        handle_sweep(config, hash, mode, cli.resume).await?;
    }

    Ok(())
}

/// Sets up a console layer and an append-only file layer
///
/// The returned guard must live until exit so buffered lines reach the file.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_path: &Path,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "catalog_sweep=info,warn",
            1 => "catalog_sweep=debug,info",
            2 => "catalog_sweep=trace,debug",
            _ => "trace",
        }
    };

    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;
    let file_name = log_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.into());

    let appender = RollingFileAppender::new(Rotation::NEVER, directory, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        );

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::new("catalog_sweep=debug,info"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn prompt_menu() -> std::io::Result<String> {
    println!("Select run mode:");
    println!("  1) Collect links, then extract details");
    println!("  2) Collect links only");
    println!("  3) Extract details from the existing link file");
    print!("Enter option: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Handles --dry-run: shows what a profile would do
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Sweep Dry Run: {} ===\n", config.site.name);

    println!("Frontier:");
    println!("  Seed: {}", config.site.seed_url);
    println!("  Mode: {:?}", config.frontier.mode);
    println!("  Item selector: {}", config.frontier.item_selector);
    println!("  Next selector: {}", config.frontier.next_selector);
    if let Some(max) = config.frontier.max_pages {
        println!("  Max pages: {}", max);
    }

    println!("\nExtraction:");
    println!("  Strategy: {:?}", config.extraction.strategy);
    if config.extraction.strategy == ExtractionStrategy::JsonEndpoint {
        println!("  Endpoint suffix: {}", config.extraction.json_suffix);
    }
    match config.variant_control_selector() {
        Some(selector) => println!("  Variant marker: {}", selector),
        None => println!("  Variant marker: none (nothing is deferred)"),
    }

    println!("\nScheduling:");
    println!(
        "  Batches of {} with {} workers",
        config.batch.size, config.batch.workers
    );
    println!(
        "  Retries: {} attempts, {}s backoff",
        config.retry.max_attempts, config.retry.backoff_secs
    );

    println!("\nOutput:");
    println!("  Links: {}", config.output.links_path);
    println!("  Details: {}", config.output.details_path);
    println!("  Deferred: {}", config.output.deferred_path);
    println!("  Failures: {}", config.output.failures_path);
    println!("  Checkpoint: {}", config.checkpoint_path());

    println!("\n✓ Profile is valid\n");
}

/// Runs one profile and prints its statistics
async fn handle_sweep(
    config: Config,
    hash: String,
    mode: RunMode,
    resume: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let site = config.site.name.clone();
    let renderer = Arc::new(HttpRenderer::new(StaticFetcher::new(&config.http)?));
    let orchestrator = Orchestrator::new(config, hash, renderer)?.with_resume(resume);

    match orchestrator.run(mode).await {
        Ok(stats) => {
            tracing::info!("Sweep of {} completed", site);
            print_statistics(&site, &stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sweep of {} failed: {}", site, e);
            Err(e.into())
        }
    }
}
