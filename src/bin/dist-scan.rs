//! Scan phase: census of native artifacts in fetched distributions.
//!
//! Prints `package,artifact,source` lines to stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use dist_harvester::census::CensusPipeline;
use dist_harvester::{ScanConfig, DEFAULT_OUTPUT_ROOT};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dist-scan", version, about)]
struct Args {
    /// Directory written by dist-fetch
    #[arg(long, env = "DIST_HARVESTER_OUTPUT", default_value = DEFAULT_OUTPUT_ROOT)]
    dists: PathBuf,

    /// Parent directory for temporary extraction trees
    #[arg(long, env = "DIST_HARVESTER_SCRATCH")]
    scratch: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ScanConfig::new(&args.dists);
    if let Some(scratch) = args.scratch {
        config = config.with_scratch_dir(scratch);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    CensusPipeline::new(config)
        .run(&mut out)
        .with_context(|| format!("census of {} failed", args.dists.display()))?;

    Ok(())
}
