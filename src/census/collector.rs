use crate::model::BinaryArtifactRecord;
use std::collections::HashSet;

/// Run-wide dedup state for the census.
///
/// Owned by one census pass: create it when the pass starts and drop it when
/// the pass ends. The seen set only ever grows.
#[derive(Debug, Default)]
pub struct CensusCollector {
    seen: HashSet<(String, String)>,
}

impl CensusCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a record the first time `(package, artifact)` is observed and
    /// `None` on every later observation, whatever the source.
    pub fn observe(&mut self, package: &str, artifact: &str, source: &str) -> Option<BinaryArtifactRecord> {
        let key = (package.to_string(), artifact.to_string());
        if !self.seen.insert(key) {
            return None;
        }

        Some(BinaryArtifactRecord {
            package: package.to_string(),
            artifact: artifact.to_string(),
            source: source.to_string(),
        })
    }
}
