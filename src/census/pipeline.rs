//! Census pass over a fetched distribution tree.
//!
//! The [`CensusPipeline`] visits `<root>/<package>/<file>` in lexicographic
//! order. Each archive goes through two stages:
//! 1. **Open**: unpack into a scoped [`ExtractionTree`](super::ExtractionTree)
//! 2. **Scan**: match filenames and emit records not yet seen in this pass
//!
//! Records are written to the sink as soon as they are found. Unsupported and
//! malformed archives are logged and skipped; everything else is fatal. A root
//! that does not exist yet is an empty tree.

use super::archive::{self, ArchiveError};
use super::collector::CensusCollector;
use super::scan;
use crate::config::ScanConfig;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Errors that end a census pass.
#[derive(thiserror::Error, Debug)]
pub enum CensusError {
    /// Listing the distribution tree or extracting into scratch space failed
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Extraction could not write to scratch space
    #[error("Failed to extract '{}': {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    /// The record sink rejected a write
    #[error("Failed to write census output: {0}")]
    Write(#[source] io::Error),
}

/// Counters for one census pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CensusReport {
    pub packages: usize,
    pub archives_scanned: usize,
    /// Unsupported or malformed archives.
    pub archives_skipped: usize,
    pub records_emitted: usize,
}

/// Sequential scan of every archive under the distribution root.
#[derive(Debug, Clone)]
pub struct CensusPipeline {
    config: ScanConfig,
}

impl CensusPipeline {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Runs one full pass, writing `package,artifact,source` lines to `out`.
    ///
    /// A fresh [`CensusCollector`] is created for the pass and dropped at the
    /// end, so separate calls never share dedup state.
    #[instrument(skip_all, fields(root = %self.config.dists_root.display()))]
    pub fn run<W: Write>(&self, out: &mut W) -> Result<CensusReport, CensusError> {
        let mut collector = CensusCollector::new();
        let mut report = CensusReport::default();

        let package_dirs = match sorted_entries(&self.config.dists_root) {
            Err(CensusError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Distribution root does not exist; nothing to scan");
                Vec::new()
            }
            other => other?,
        };

        for package_dir in package_dirs {
            if !package_dir.is_dir() {
                continue;
            }
            let Some(package) = file_name(&package_dir) else {
                continue;
            };
            report.packages += 1;

            for archive_path in sorted_entries(&package_dir)? {
                if !archive_path.is_file() {
                    continue;
                }
                self.census_archive(&package, &archive_path, &mut collector, &mut report, out)?;
            }
        }

        out.flush().map_err(CensusError::Write)?;
        info!(
            packages = report.packages,
            scanned = report.archives_scanned,
            skipped = report.archives_skipped,
            records = report.records_emitted,
            "Census finished"
        );
        Ok(report)
    }

    fn census_archive<W: Write>(
        &self,
        package: &str,
        archive_path: &Path,
        collector: &mut CensusCollector,
        report: &mut CensusReport,
        out: &mut W,
    ) -> Result<(), CensusError> {
        let source = file_name(archive_path).unwrap_or_default();

        let tree = match archive::open(archive_path, self.config.scratch_dir.as_deref()) {
            Ok(tree) => tree,
            Err(e) if e.is_recoverable() => {
                warn!(package, archive = %source, error = %e, "Skipping archive");
                report.archives_skipped += 1;
                return Ok(());
            }
            Err(e) => {
                return Err(CensusError::Archive {
                    path: archive_path.to_path_buf(),
                    source: e,
                })
            }
        };

        for record in scan::scan(package, &source, &tree, collector) {
            writeln!(out, "{record}").map_err(CensusError::Write)?;
            out.flush().map_err(CensusError::Write)?;
            report.records_emitted += 1;
        }
        report.archives_scanned += 1;

        // `tree` drops here and its directory is removed.
        Ok(())
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, CensusError> {
    let io_err = |source| CensusError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
