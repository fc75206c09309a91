//! Fetch phase: index lookup plus integrity-checked, retrying downloads.
//!
//! For every package the [`Fetcher`]:
//! 1. creates `<output_root>/<package>/`
//! 2. reads the package's file list from the JSON index
//! 3. skips each file whose local copy already has the expected SHA-256,
//!    otherwise deletes it and streams a fresh copy to disk
//!
//! Files of one package are fetched one after another; concurrency across
//! packages lives in [`crate::executor::FetchExecutor`].

pub mod client;
pub mod integrity;
pub mod retry;

pub use client::RetryClient;
pub use retry::{RetryOn, RetryPolicy};

use crate::config::FetchConfig;
use crate::model::{DistributionFile, Package, PackageIndex};
use reqwest::StatusCode;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Errors that abort a package fetch.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Non-200 status outside the retry policy (e.g. 404)
    #[error("GET {url} returned {status}")]
    Status { url: String, status: StatusCode },

    /// Retryable failures on every attempt
    #[error("GET {url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// Non-retryable transport failure, including a body cut off mid-stream
    #[error("HTTP transport error for '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed index response for '{package}': {source}")]
    MalformedMetadata {
        package: String,
        #[source]
        source: serde_json::Error,
    },

    /// Index lists a filename that is not a single path component
    #[error("Refusing unsafe filename '{filename}' for '{package}'")]
    UnsafeFilename { package: String, filename: String },

    /// Freshly downloaded bytes do not hash to the expected digest
    #[error("Digest mismatch for '{}': expected {expected}, got {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What happened to a single distribution file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Local copy already matched its digest; no request was made.
    Skipped,
    Downloaded { bytes: u64 },
}

/// Per-package result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub package: Package,
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes_downloaded: u64,
}

impl PackageReport {
    fn new(package: Package) -> Self {
        Self {
            package,
            downloaded: 0,
            skipped: 0,
            bytes_downloaded: 0,
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes_downloaded += bytes;
            }
        }
    }
}

/// Downloads every distribution file of a package into the output root.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: RetryClient,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = RetryClient::with_timeout(config.request_timeout, config.retry.clone())?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: RetryClient, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    #[instrument(skip(self, package), fields(package = %package))]
    pub async fn fetch_package(&self, package: &Package) -> Result<PackageReport, FetchError> {
        let package_dir = self.config.package_dir(package);
        tokio::fs::create_dir_all(&package_dir)
            .await
            .map_err(FetchError::io(&package_dir))?;

        let files = self.lookup(package).await?;
        info!(files = files.len(), "Downloading package");

        let mut report = PackageReport::new(package.clone());
        for file in &files {
            report.record(self.fetch_file(file).await?);
        }

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            bytes = report.bytes_downloaded,
            "Package complete"
        );
        Ok(report)
    }

    /// Reads the package's file list from the index.
    pub async fn lookup(&self, package: &Package) -> Result<Vec<DistributionFile>, FetchError> {
        let url = self.config.index_url_for(package);
        let body = self
            .client
            .get(&url)
            .await?
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let index: PackageIndex =
            serde_json::from_slice(&body).map_err(|source| FetchError::MalformedMetadata {
                package: package.to_string(),
                source,
            })?;

        let package_dir = self.config.package_dir(package);
        index
            .urls
            .into_iter()
            .map(|entry| {
                let filename = entry.filename.clone();
                DistributionFile::from_release(package, entry, &package_dir).ok_or_else(|| {
                    FetchError::UnsafeFilename {
                        package: package.to_string(),
                        filename,
                    }
                })
            })
            .collect()
    }

    /// Skips `file` if its local copy is valid, otherwise downloads it.
    #[instrument(skip(self, file), fields(filename = %file.filename))]
    pub async fn fetch_file(&self, file: &DistributionFile) -> Result<FileOutcome, FetchError> {
        let path = &file.local_path;

        if file_matches(path, &file.sha256).await? {
            debug!("Local copy matches digest, skipping");
            return Ok(FileOutcome::Skipped);
        }

        remove_if_exists(path).await?;

        info!(url = %file.url, "Downloading");
        let response = self.client.get(&file.url).await?;
        let bytes = self.write_body(response, &file.url, path).await?;

        if self.config.verify_downloads {
            let actual = digest(path).await?;
            if !actual.eq_ignore_ascii_case(&file.sha256) {
                warn!(expected = %file.sha256, %actual, "Downloaded file failed digest check");
                remove_if_exists(path).await?;
                return Err(FetchError::DigestMismatch {
                    path: path.clone(),
                    expected: file.sha256.clone(),
                    actual,
                });
            }
        }

        Ok(FileOutcome::Downloaded { bytes })
    }

    /// Streams the body to `path`, holding at most `chunk_size` bytes in memory.
    async fn write_body(
        &self,
        mut response: reqwest::Response,
        url: &str,
        path: &Path,
    ) -> Result<u64, FetchError> {
        let mut out = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(FetchError::io(path))?;

        let chunk_size = self.config.chunk_size;
        let mut buffer: Vec<u8> = Vec::new();
        let mut written = 0u64;

        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            let done = chunk.is_none();
            if let Some(bytes) = chunk {
                buffer.extend_from_slice(&bytes);
            }

            if buffer.len() >= chunk_size || (done && !buffer.is_empty()) {
                out.write_all(&buffer).await.map_err(FetchError::io(path))?;
                written += buffer.len() as u64;
                buffer.clear();
            }

            if done {
                break;
            }
        }

        out.flush().await.map_err(FetchError::io(path))?;
        Ok(written)
    }
}

async fn file_matches(path: &Path, expected: &str) -> Result<bool, FetchError> {
    let owned = path.to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || integrity::matches(&owned, &expected))
        .await
        .map_err(|e| FetchError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?
        .map_err(FetchError::io(path))
}

async fn digest(path: &Path) -> Result<String, FetchError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || integrity::digest_of(&owned))
        .await
        .map_err(|e| FetchError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?
        .map_err(FetchError::io(path))
}

async fn remove_if_exists(path: &Path) -> Result<(), FetchError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FetchError::io(path)(e)),
    }
}
