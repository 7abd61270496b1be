//! crawl-frontier main entry point
//!
//! This is the command-line interface for the crawl-frontier crawler.

use clap::Parser;
use crawl_frontier::config::{load_config_with_hash, Config};
use crawl_frontier::crawler::crawler_from_config;
use crawl_frontier::state::CrawlStatus;
use crawl_frontier::storage::{open_storage, share};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// crawl-frontier: a resumable, depth-by-depth web crawler
///
/// Each depth level is one fetch cycle: pending records are generated from
/// the store, fetched by a pool of workers, and the links they discover are
/// merged back for the next level.
#[derive(Parser, Debug)]
#[command(name = "crawl-frontier")]
#[command(version)]
#[command(about = "A resumable crawl frontier and fetch scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Keep records from earlier runs (overrides `resumable = false`)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Clear the store before crawling (overrides `resumable = true`)
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "dump"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "dump"])]
    stats: bool,

    /// Print stored records, one per line, and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    dump: bool,

    /// Only dump records with this status (unexecuted, success, failed)
    #[arg(long, requires = "dump", value_parser = parse_status)]
    status: Option<CrawlStatus>,
}

fn parse_status(s: &str) -> Result<CrawlStatus, String> {
    CrawlStatus::from_db_string(s)
        .ok_or_else(|| format!("unknown status '{}', expected unexecuted, success or failed", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.dump {
        handle_dump(&config, cli.status)?;
    } else {
        let resumable = if cli.fresh {
            false
        } else {
            cli.resume || config.crawler.resumable
        };
        handle_crawl(config, config_hash, resumable).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_frontier=info,warn"),
            1 => EnvFilter::new("crawl_frontier=debug,info"),
            2 => EnvFilter::new("crawl_frontier=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== crawl-frontier Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Depth levels: {}", config.crawler.depth);
    println!("  Threads: {}", config.crawler.threads);
    println!("  Resumable: {}", config.crawler.resumable);
    println!("  Auto-parse: {}", config.crawler.auto_parse);
    match config.crawler.max_depth {
        Some(max) => println!("  Max link depth: {}", max),
        None => println!("  Max link depth: unlimited"),
    }

    let options = config.scheduler_options();
    println!("\nScheduler:");
    println!("  Queue depth: {}", options.queue_depth);
    println!("  Hang timeout: {:?}", options.hang_timeout);
    println!("  Drain timeout: {:?}", options.drain_timeout);
    println!("  Execute interval: {:?}", options.execute_interval);

    let generator = config.generator_options();
    println!("\nGenerator:");
    println!(
        "  Top N: {}",
        generator
            .top_n
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
    );
    println!(
        "  Max execute count: {}",
        generator
            .max_execute_count
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for seed in &config.seeds.urls {
        println!("  - {}", seed);
    }
    println!("\nForced Seeds ({}):", config.seeds.forced.len());
    for seed in &config.seeds.forced {
        println!("  - {}", seed);
    }

    println!("\nLink Rules ({}):", config.rules.patterns.len());
    for pattern in &config.rules.patterns {
        println!("  {}", pattern);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would run {} cycle(s) from {} seed URLs",
        config.crawler.depth,
        config.seeds.urls.len() + config.seeds.forced.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use crawl_frontier::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let store = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --dump mode: prints stored records
fn handle_dump(
    config: &Config,
    status: Option<CrawlStatus>,
) -> Result<(), Box<dyn std::error::Error>> {
    use crawl_frontier::output::print_records;

    let store = open_storage(Path::new(&config.storage.database_path))?;
    let printed = print_records(&store, status)?;
    tracing::info!("Dumped {} record(s)", printed);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    resumable: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if resumable {
        tracing::info!("Starting crawl (resuming from stored records)");
    } else {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    }

    tracing::info!(
        "Seeds: {}, forced seeds: {}, link rules: {}",
        config.seeds.urls.len(),
        config.seeds.forced.len(),
        config.rules.patterns.len()
    );

    let store = share(open_storage(Path::new(&config.storage.database_path))?);
    let crawler = crawler_from_config(&config, store)?
        .resumable(resumable)
        .config_hash(config_hash);

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    match crawler.start(config.crawler.depth).await {
        Ok(report) => {
            tracing::info!(
                "Crawl finished: {} cycle(s), {} generated, {} succeeded, {} failed in {:.1}s",
                report.cycles.len(),
                report.total_generated(),
                report.total_succeeded(),
                report.total_failed(),
                report.elapsed().as_secs_f64()
            );
            if report.interrupted() {
                tracing::warn!("Crawl was interrupted; rerun with --resume to continue");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
