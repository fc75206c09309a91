//! Phase configuration.
//!
//! Both phases are configured through plain value objects with defaults that
//! match a local run against PyPI; the binaries layer CLI flags and
//! environment variables on top.

use crate::fetch::RetryPolicy;
use crate::model::Package;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi/{package}/json";
pub const DEFAULT_OUTPUT_ROOT: &str = "dists";
pub const DEFAULT_CATALOG_PATH: &str = "pypi.db";
pub const DEFAULT_TOP_N: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 8;
/// Downloads are buffered and written in pieces of at most this size (100 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024 * 1024;

/// Settings for the fetch phase.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// One subdirectory per package is created here.
    pub output_root: PathBuf,

    /// Index endpoint; `{package}` is replaced by the package name.
    pub index_url: String,

    /// Upper bound on packages (and therefore connections) in flight.
    pub concurrency: usize,

    pub chunk_size: usize,

    /// Per-request timeout, counted by the retry policy as a timeout failure.
    pub request_timeout: Duration,

    pub retry: RetryPolicy,

    /// Re-hash each file right after download and reject mismatches.
    pub verify_downloads: bool,

    /// Abort the remaining packages on the first failure.
    pub fail_fast: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            index_url: DEFAULT_INDEX_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            verify_downloads: true,
            fail_fast: false,
        }
    }
}

impl FetchConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    pub fn with_index_url(mut self, template: impl Into<String>) -> Self {
        self.index_url = template.into();
        self
    }

    /// Zero is treated as one.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verify_downloads(mut self, verify: bool) -> Self {
        self.verify_downloads = verify;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn index_url_for(&self, package: &Package) -> String {
        self.index_url.replace("{package}", package.name())
    }

    pub fn package_dir(&self, package: &Package) -> PathBuf {
        self.output_root.join(package.name())
    }
}

/// Settings for the scan phase.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root written by the fetch phase.
    pub dists_root: PathBuf,

    /// Parent for extraction trees; the system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dists_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            scratch_dir: None,
        }
    }
}

impl ScanConfig {
    pub fn new(dists_root: impl Into<PathBuf>) -> Self {
        Self {
            dists_root: dists_root.into(),
            scratch_dir: None,
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}
