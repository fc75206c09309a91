//! Filename matching for compiled native artifacts.

use super::archive::ExtractionTree;
use super::collector::CensusCollector;
use crate::model::BinaryArtifactRecord;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Shared objects (optionally versioned, `libz.so.1.2.13`, `libssl.so.1.0.2k`),
/// DLLs, `.pyd` extension modules and static archives. Each version component
/// starts with a digit.
pub const ARTIFACT_PATTERN: &str = r"\.(?:so(?:\.\d[0-9A-Za-z_+-]*)*|dll|pyd|a)$";

fn artifact_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ARTIFACT_PATTERN).expect("artifact pattern is valid"))
}

/// Whether `file_name` looks like a compiled artifact.
pub fn is_binary_artifact(file_name: &str) -> bool {
    artifact_regex().is_match(file_name)
}

/// Walks `tree` and returns records for artifacts `collector` has not seen yet.
///
/// Walk order is whatever the filesystem yields. Unreadable entries are logged
/// and skipped.
pub fn scan(
    package: &str,
    source_filename: &str,
    tree: &ExtractionTree,
    collector: &mut CensusCollector,
) -> Vec<BinaryArtifactRecord> {
    let mut records = Vec::new();

    for entry in WalkDir::new(tree.path()) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(archive = source_filename, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_binary_artifact(&name) {
            continue;
        }

        match collector.observe(package, &name, source_filename) {
            Some(record) => records.push(record),
            None => debug!(package, artifact = %name, "Already censused"),
        }
    }

    records
}
