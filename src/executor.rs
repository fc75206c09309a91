use crate::fetch::{FetchError, Fetcher, PackageReport};
use crate::model::Package;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// A package whose fetch failed, with the error that stopped it.
#[derive(Debug)]
pub struct PackageFailure {
    pub package: Package,
    pub error: FetchError,
}

/// Aggregated outcome of a fetch run.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub completed: Vec<PackageReport>,
    pub failures: Vec<PackageFailure>,
    /// Packages aborted before finishing because of `fail_fast`.
    pub cancelled: usize,
}

impl FetchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    pub fn downloaded(&self) -> usize {
        self.completed.iter().map(|r| r.downloaded).sum()
    }

    pub fn skipped(&self) -> usize {
        self.completed.iter().map(|r| r.skipped).sum()
    }
}

/// Runs package fetches concurrently, at most `concurrency_limit` at a time.
///
/// Each package fetches its files sequentially and holds one permit for the
/// whole time, so open connections never exceed the limit.
pub struct FetchExecutor {
    fetcher: Arc<Fetcher>,
    semaphore: Arc<Semaphore>,
    fail_fast: bool,
}

impl FetchExecutor {
    pub fn new(fetcher: Fetcher) -> Self {
        let concurrency_limit = fetcher.config().concurrency.max(1);
        let fail_fast = fetcher.config().fail_fast;
        Self {
            fetcher: Arc::new(fetcher),
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            fail_fast,
        }
    }

    /// Stops scheduling and aborts in-flight packages on the first failure.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    #[instrument(skip_all, fields(packages = packages.len()))]
    pub async fn fetch_all(&self, packages: Vec<Package>) -> FetchSummary {
        let mut tasks = JoinSet::new();

        for package in packages {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&self.semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await;
                let result = fetcher.fetch_package(&package).await;
                (package, result)
            });
        }

        let mut summary = FetchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => summary.completed.push(report),
                Ok((package, Err(error))) => {
                    error!(%package, %error, "Package fetch failed");
                    summary.failures.push(PackageFailure { package, error });
                    if self.fail_fast {
                        tasks.abort_all();
                    }
                }
                Err(e) if e.is_cancelled() => summary.cancelled += 1,
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            }
        }

        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "Aborted remaining packages after failure");
        }
        info!(
            completed = summary.completed.len(),
            failed = summary.failures.len(),
            downloaded = summary.downloaded(),
            skipped = summary.skipped(),
            "Fetch finished"
        );
        summary
    }
}
