//! Formasi-Harvester main entry point
//!
//! This is the command-line interface for the Formasi-Harvester.

use anyhow::Context;
use chrono::Local;
use clap::{Parser, ValueEnum};
use formasi_harvester::config::{load_config, validate, Config};
use formasi_harvester::harvest::{
    event_channel, DemoSource, EventReceiver, HarvestEvent, HarvestOutcome, HarvestRequest,
    Harvester, HttpPageFetcher, PageSource,
};
use formasi_harvester::output::{
    export_file_name, format_record_page, print_summary, write_csv, ExportScope,
};
use formasi_harvester::table::{page_count, paginate, Record};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Formasi-Harvester: harvest, search and export vacancy listings
///
/// Pages through the listing API concurrently, keeps the records in server
/// order, and lets you search and export the result.
#[derive(Parser, Debug)]
#[command(name = "formasi-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Harvest, search and export vacancy listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Use the built-in demo dataset instead of the live API
    #[arg(long)]
    demo: bool,

    /// Recruitment year
    #[arg(long)]
    year: Option<String>,

    /// Education filter code (kode_ref_pend); empty for everything
    #[arg(long)]
    filter: Option<String>,

    /// Stop after this many records
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_records: Option<u64>,

    /// Maximum concurrent page fetches
    #[arg(short, long)]
    workers: Option<usize>,

    /// Case-insensitive search over every field
    #[arg(short, long, default_value = "")]
    search: String,

    /// Display page to print, numbered from 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    page: u64,

    /// Records per display page
    #[arg(long, default_value_t = 20)]
    page_size: usize,

    /// Write CSV exports (repeatable)
    #[arg(long, value_enum)]
    export: Vec<ExportKind>,

    /// Directory for CSV exports (overrides config)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportKind {
    /// Every harvested record
    All,
    /// Records matching --search
    Filtered,
    /// The page selected by --page
    Page,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config, cli.demo);
        return Ok(());
    }

    let outcome = handle_harvest(&config, cli.demo).await?;

    if !cli.quiet {
        print_summary(&outcome);
    }

    let filtered = outcome.table.search(&cli.search);
    if !cli.search.is_empty() {
        println!(
            "\nFound {} of {} records matching '{}'",
            filtered.len(),
            outcome.table.len(),
            cli.search
        );
    }

    let page_index = usize::try_from(cli.page - 1).unwrap_or(usize::MAX);
    let pages = page_count(filtered.len(), cli.page_size);
    let shown = paginate(&filtered, page_index, cli.page_size);

    if !cli.quiet {
        if shown.is_empty() {
            println!("\nNo records to show");
        } else {
            println!("\nPage {} of {}", page_index + 1, pages);
            print!(
                "{}",
                format_record_page(shown, page_index * cli.page_size + 1)
            );
        }
    }

    handle_exports(&cli, &config, &outcome, &filtered, page_index, shown)?;

    ensure_harvest_succeeded(&outcome)
}

/// Turns an aborted harvest into an error so the process exits non-zero
fn ensure_harvest_succeeded(outcome: &HarvestOutcome) -> anyhow::Result<()> {
    if outcome.status.is_success() {
        return Ok(());
    }

    let cause = outcome
        .last_failure
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "unknown failure".to_string());
    anyhow::bail!(
        "Harvest {} ({}) after {} records",
        outcome.status,
        cause,
        outcome.table.len()
    )
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("formasi_harvester=info,warn"),
            1 => EnvFilter::new("formasi_harvester=debug,info"),
            2 => EnvFilter::new("formasi_harvester=trace,debug"),
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

/// Loads the config file (or defaults) and applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(year) = &cli.year {
        config.api.year = year.clone();
    }
    if let Some(filter) = &cli.filter {
        config.harvest.filter = filter.clone();
    }
    if let Some(max_records) = cli.max_records {
        config.harvest.max_records = Some(usize::try_from(max_records).unwrap_or(usize::MAX));
    }
    if let Some(workers) = cli.workers {
        config.harvest.max_workers = workers;
    }
    if let Some(dir) = &cli.out_dir {
        config.output.directory = dir.display().to_string();
    }

    validate(&config).context("Invalid configuration after command-line overrides")?;
    Ok(config)
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, demo: bool) {
    println!("=== Formasi-Harvester Dry Run ===\n");

    if demo {
        println!("Source: built-in demo dataset");
    } else {
        println!("Source:");
        println!("  Endpoint: {}", config.api.endpoint());
        println!("  Portal: {}", config.api.portal_origin());
        println!("  User agent: {}", config.api.user_agent);
        println!("  Timeout: {}s", config.api.timeout_secs);
    }

    println!("\nHarvest:");
    if config.harvest.filter.is_empty() {
        println!("  Filter: (none)");
    } else {
        println!("  Filter: {}", config.harvest.filter);
    }
    match config.harvest.max_records {
        Some(max) => println!("  Max records: {}", max),
        None => println!("  Max records: unlimited"),
    }
    println!("  Workers: {}", config.harvest.max_workers);
    println!("  Failure threshold: {}", config.harvest.failure_threshold);
    println!("  Request spacing: {}ms", config.harvest.request_spacing_ms);

    println!("\nRetry:");
    println!("  Attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms doubling to {}ms",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Prefix: {}", config.output.file_prefix);

    println!("\n✓ Configuration is valid");
}

/// Runs the harvest and logs progress events as they arrive
async fn handle_harvest(config: &Config, demo: bool) -> anyhow::Result<HarvestOutcome> {
    let source: Arc<dyn PageSource> = if demo {
        tracing::info!("Using built-in demo dataset");
        Arc::new(DemoSource::new())
    } else {
        tracing::info!("Harvesting from {}", config.api.endpoint());
        Arc::new(HttpPageFetcher::new(config).context("Failed to build page fetcher")?)
    };

    let (tx, rx) = event_channel();
    let progress = tokio::spawn(log_progress(rx));

    let harvester = Harvester::from_config(source, &config.harvest).with_events(tx);
    let outcome = harvester
        .harvest(&HarvestRequest::from_config(&config.harvest))
        .await;

    // Dropping the harvester closes the channel so the logger can finish.
    drop(harvester);
    if let Err(e) = progress.await {
        tracing::warn!("Progress logger stopped unexpectedly: {}", e);
    }

    if outcome.table.is_empty() {
        tracing::error!("No records were harvested");
    }

    Ok(outcome)
}

async fn log_progress(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            HarvestEvent::PhaseChanged { phase } => tracing::trace!("Phase: {}", phase),
            HarvestEvent::Probed { total_hint } => match total_hint {
                Some(total) => tracing::info!("Expecting {} records", total),
                None => tracing::info!("Record total unknown"),
            },
            HarvestEvent::PageCompleted {
                offset,
                records,
                total_records,
            } => tracing::info!(
                "Offset {}: {} records ({} so far)",
                offset,
                records,
                total_records
            ),
            HarvestEvent::PageFailed {
                offset,
                kind,
                consecutive_failures,
            } => tracing::warn!(
                "Offset {} failed: {} ({} in a row)",
                offset,
                kind,
                consecutive_failures
            ),
            HarvestEvent::Finished {
                status,
                total_records,
            } => tracing::info!("Finished: {} ({} records)", status, total_records),
        }
    }
}

/// Writes the requested CSV exports
fn handle_exports(
    cli: &Cli,
    config: &Config,
    outcome: &HarvestOutcome,
    filtered: &[&Record],
    page_index: usize,
    shown: &[&Record],
) -> anyhow::Result<()> {
    if cli.export.is_empty() {
        return Ok(());
    }

    let dir = Path::new(&config.output.directory);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let now = Local::now();
    let prefix = &config.output.file_prefix;

    for kind in &cli.export {
        let written = match kind {
            ExportKind::All => write_csv(
                &dir.join(export_file_name(prefix, ExportScope::All, &now)),
                outcome.table.records(),
            )?,
            ExportKind::Filtered => {
                if cli.search.is_empty() || filtered.is_empty() {
                    tracing::warn!("Skipping filtered export: no search results");
                    continue;
                }
                write_csv(
                    &dir.join(export_file_name(prefix, ExportScope::Filtered, &now)),
                    filtered.iter().copied(),
                )?
            }
            ExportKind::Page => {
                if shown.is_empty() {
                    tracing::warn!("Skipping page export: page {} is empty", cli.page);
                    continue;
                }
                write_csv(
                    &dir.join(export_file_name(
                        prefix,
                        ExportScope::Page(page_index.saturating_add(1)),
                        &now,
                    )),
                    shown.iter().copied(),
                )?
            }
        };
        println!("✓ Exported to: {}", written.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use formasi_harvester::table::ResultTable;
    use formasi_harvester::{FailureKind, HarvestStatus};

    fn outcome(status: HarvestStatus) -> HarvestOutcome {
        HarvestOutcome {
            table: ResultTable::new(),
            status,
            last_failure: Some(FailureKind::Transient.exhausted()),
            failed_offsets: vec![10, 20, 30],
            pages_fetched: 1,
            total_hint: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_page_zero_rejected() {
        assert!(Cli::try_parse_from(["formasi-harvester", "--page", "0"]).is_err());

        let cli = Cli::try_parse_from(["formasi-harvester", "--page", "3"]).unwrap();
        assert_eq!(cli.page, 3);
    }

    #[test]
    fn test_aborted_harvest_is_an_error() {
        let err = ensure_harvest_succeeded(&outcome(HarvestStatus::Aborted)).unwrap_err();
        assert!(err.to_string().contains("ABORTED"));
        assert!(err.to_string().contains("exhausted_retries"));

        assert!(ensure_harvest_succeeded(&outcome(HarvestStatus::Complete)).is_ok());
        assert!(ensure_harvest_succeeded(&outcome(HarvestStatus::Capped)).is_ok());
    }
}
