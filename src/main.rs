//! Trimtrawl main entry point
//!
//! Command-line interface for the vehicle configurator traversal scraper.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trimtrawl::config::{load_config_with_hash, Config, SiteEntry};
use trimtrawl::engine::{Driver, Fetcher, HttpFetcher};
use trimtrawl::output::open_sink;
use trimtrawl::sites::{build_pipeline, SITE_NAMES};
use trimtrawl::TrawlError;
use tracing_subscriber::EnvFilter;

/// Trimtrawl: vehicle configurator traversal scraper
///
/// Walks automaker configurator sites level by level (catalog, model, body
/// style, drive type, trim, colors, packages) and writes one record per
/// fully-resolved vehicle configuration.
#[derive(Parser, Debug)]
#[command(name = "trimtrawl")]
#[command(version = "1.0.0")]
#[command(about = "Vehicle configurator traversal scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only the named site(s); defaults to every configured site
    #[arg(short, long)]
    site: Vec<String>,

    /// List the configured sites and exit
    #[arg(long, conflicts_with = "dry_run")]
    list_sites: bool,

    /// Resolve the pipeline plan without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.list_sites {
        handle_list_sites(&config);
        return Ok(());
    }

    let selected = select_sites(&config, &cli.site)?;

    if cli.dry_run {
        handle_dry_run(&selected)?;
        return Ok(());
    }

    handle_crawl(&config, &config_hash, &selected).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trimtrawl=info,warn"),
            1 => EnvFilter::new("trimtrawl=debug,info"),
            2 => EnvFilter::new("trimtrawl=trace,debug"),
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

/// Resolves the `--site` selection against the configured entries
fn select_sites<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a SiteEntry>, TrawlError> {
    if names.is_empty() {
        return Ok(config.site.iter().collect());
    }

    names
        .iter()
        .map(|name| {
            config
                .site(name)
                .ok_or_else(|| TrawlError::UnknownSite(name.clone()))
        })
        .collect()
}

/// Handles --list-sites
fn handle_list_sites(config: &Config) {
    println!("Registered site templates: {}", SITE_NAMES.join(", "));
    println!("\nConfigured sites ({}):", config.site.len());
    for site in &config.site {
        let zip = site.zip_code.as_deref().unwrap_or("-");
        println!(
            "  - {} (zip: {}, seeds: {}, defaults: {})",
            site.name,
            zip,
            site.seeds.len(),
            site.defaults.len()
        );
    }
}

/// Handles --dry-run: resolves each pipeline and prints its plan
fn handle_dry_run(selected: &[&SiteEntry]) -> anyhow::Result<()> {
    println!("=== Trimtrawl Dry Run ===\n");

    for entry in selected {
        let pipeline = build_pipeline(entry)?;

        println!("Site: {}", pipeline.site);
        println!("  Stages ({}):", pipeline.depth());
        for (depth, stage) in pipeline.stages.iter().enumerate() {
            println!("    {}. {}", depth, stage.name);
        }
        println!("  Seeds ({}):", pipeline.seeds.len());
        for seed in &pipeline.seeds {
            println!("    * {}", seed.request.url);
        }
        println!("  Required fields: {}\n", pipeline.required_fields.join(", "));
    }

    println!("✓ All pipelines resolved");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    selected: &[&SiteEntry],
) -> anyhow::Result<()> {
    if selected.is_empty() {
        tracing::warn!("No sites configured, nothing to crawl");
        return Ok(());
    }

    let mut sink = open_sink(&config.output)
        .with_context(|| format!("failed to open {}", config.output.records_path))?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.engine)?);
    let failure_log = Path::new(&config.output.failure_log_path);

    let mut total_emitted = 0u64;
    for entry in selected {
        let pipeline = build_pipeline(entry)?;
        let driver = Driver::new(
            pipeline,
            Arc::clone(&fetcher),
            config.engine.clone(),
            config_hash,
        );

        let report = driver.run(sink.as_mut()).await?;
        report
            .append_failure_log(failure_log)
            .with_context(|| format!("failed to write {}", failure_log.display()))?;

        println!(
            "{}: {} records, {} skipped, {} abandoned, {:.1}% of branches succeeded",
            report.site,
            report.records_emitted,
            report.branches_skipped,
            report.branches_failed(),
            report.success_rate()
        );
        total_emitted += report.records_emitted;
    }

    sink.finish()?;
    println!(
        "✓ {} record(s) written to {}",
        total_emitted, config.output.records_path
    );

    Ok(())
}
