//! Fetch phase: download every distribution file of the top binary packages.

use anyhow::{bail, Context, Result};
use clap::Parser;
use dist_harvester::fetch::{Fetcher, RetryPolicy};
use dist_harvester::{
    FetchConfig, FetchExecutor, PackageCatalog, SqliteCatalog, StaticCatalog, DEFAULT_CATALOG_PATH,
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_INDEX_URL, DEFAULT_OUTPUT_ROOT, DEFAULT_TOP_N,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dist-fetch", version, about)]
struct Args {
    /// SQLite database with the ranked `packages` table
    #[arg(long, env = "DIST_HARVESTER_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,

    /// Fetch these packages instead of querying the catalog (repeatable)
    #[arg(long = "package", value_name = "NAME")]
    packages: Vec<String>,

    /// Number of top packages to fetch
    #[arg(long, env = "DIST_HARVESTER_TOP_N", default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Directory that receives one subdirectory per package
    #[arg(long, env = "DIST_HARVESTER_OUTPUT", default_value = DEFAULT_OUTPUT_ROOT)]
    output: PathBuf,

    /// Index URL template; `{package}` is substituted
    #[arg(long, env = "DIST_HARVESTER_INDEX_URL", default_value = DEFAULT_INDEX_URL)]
    index_url: String,

    /// Maximum packages (and connections) in flight
    #[arg(long, env = "DIST_HARVESTER_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Attempts per HTTP call, including the first
    #[arg(long, env = "DIST_HARVESTER_ATTEMPTS", default_value_t = 10)]
    attempts: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "DIST_HARVESTER_TIMEOUT", default_value_t = 300)]
    timeout_secs: u64,

    /// Write buffer size in bytes
    #[arg(long, env = "DIST_HARVESTER_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Skip the digest check right after each download
    #[arg(long, env = "DIST_HARVESTER_NO_VERIFY")]
    no_verify: bool,

    /// Abort all remaining packages on the first failure
    #[arg(long, env = "DIST_HARVESTER_FAIL_FAST")]
    fail_fast: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let packages = if args.packages.is_empty() {
        SqliteCatalog::new(&args.catalog)
            .top_binary_packages(args.top_n)
            .await
            .with_context(|| format!("failed to read catalog {}", args.catalog.display()))?
    } else {
        StaticCatalog::new(&args.packages)
            .top_binary_packages(args.top_n)
            .await
            .context("failed to load --package list")?
    };
    tracing::info!(packages = packages.len(), "Loaded package list");

    let config = FetchConfig::new(&args.output)
        .with_index_url(args.index_url)
        .with_concurrency(args.concurrency)
        .with_chunk_size(args.chunk_size)
        .with_request_timeout(Duration::from_secs(args.timeout_secs))
        .with_retry(RetryPolicy::default().with_max_attempts(args.attempts))
        .with_verify_downloads(!args.no_verify)
        .with_fail_fast(args.fail_fast);

    std::fs::create_dir_all(&config.output_root)
        .with_context(|| format!("failed to create {}", config.output_root.display()))?;

    let fetcher = Fetcher::new(config).context("failed to build HTTP client")?;
    let summary = FetchExecutor::new(fetcher).fetch_all(packages).await;

    if !summary.is_success() {
        for failure in &summary.failures {
            tracing::error!(package = %failure.package, error = %failure.error, "Failed");
        }
        bail!(
            "{} package(s) failed, {} cancelled",
            summary.failures.len(),
            summary.cancelled
        );
    }

    Ok(())
}
