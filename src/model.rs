//! Data model shared by the fetch and census phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A package name as it appears in the catalog.
///
/// Names are lower-cased on construction; the lower-cased form is used both
/// for the index lookup and for the package's directory under the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Package {
    name: String,
}

impl Package {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Body of the per-package JSON index endpoint. Only the fields we use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIndex {
    pub urls: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseFile {
    pub digests: Digests,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digests {
    pub sha256: String,
}

/// One downloadable file of a package, bound to its place on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionFile {
    pub package: Package,
    pub filename: String,
    pub url: String,
    /// Lower-case hex SHA-256.
    pub sha256: String,
    pub local_path: PathBuf,
}

impl DistributionFile {
    /// Binds an index entry to `package_dir`.
    ///
    /// Returns `None` when the filename is not a single plain path component,
    /// so a hostile index cannot write outside the package directory.
    pub fn from_release(package: &Package, entry: ReleaseFile, package_dir: &Path) -> Option<Self> {
        if !is_plain_file_name(&entry.filename) {
            return None;
        }

        Some(Self {
            package: package.clone(),
            local_path: package_dir.join(&entry.filename),
            filename: entry.filename,
            url: entry.url,
            sha256: entry.digests.sha256.to_lowercase(),
        })
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// A compiled artifact found inside a distribution file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryArtifactRecord {
    pub package: String,
    pub artifact: String,
    pub source: String,
}

impl fmt::Display for BinaryArtifactRecord {
    /// `package,artifact,source`; fields are not escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.package, self.artifact, self.source)
    }
}
