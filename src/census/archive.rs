//! Scoped extraction of distribution archives.
//!
//! [`open`] unpacks an archive into a fresh temporary directory and hands back
//! an [`ExtractionTree`]. The directory lives exactly as long as that value.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

/// Container formats we know how to unpack, chosen by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.whl`, `.zip`, `.egg`
    Zip,
    /// `.tar.gz`, `.tgz`
    TarGz,
}

impl ArchiveKind {
    /// Case-insensitive suffix match; `None` for anything else.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if [".whl", ".zip", ".egg"].iter().any(|ext| name.ends_with(ext)) {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// Errors from opening one archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Suffix not recognized; nothing was extracted
    #[error("Unknown extension: {0}")]
    UnsupportedExtension(String),

    /// Corrupt or unreadable zip/tar structure
    #[error("Malformed archive '{archive}': {reason}")]
    Malformed { archive: String, reason: String },

    /// Archive could not be opened, or scratch space could not be created or
    /// written to
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Whether the census should log this and move on to the next archive.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnsupportedExtension(_) | Self::Malformed { .. })
    }
}

/// Unpacked contents of one archive.
///
/// The backing directory is removed when this value is dropped, on every exit
/// path including errors and panics. It is deliberately not `Clone`.
#[derive(Debug)]
pub struct ExtractionTree {
    dir: Option<TempDir>,
    root: PathBuf,
    kind: ArchiveKind,
    source: PathBuf,
}

impl ExtractionTree {
    /// Directory holding the extracted entries.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Archive this tree was extracted from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for ExtractionTree {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(path = %self.root.display(), error = %e, "Failed to remove extraction directory");
            }
        }
    }
}

/// Extracts `archive` into a new directory under `scratch` (or the system
/// temp dir).
///
/// # Errors
///
/// [`ArchiveError::UnsupportedExtension`] and [`ArchiveError::Malformed`] are
/// per-archive and recoverable; [`ArchiveError::Io`] is not. Any partially
/// extracted directory is removed before the error is returned.
pub fn open(archive: &Path, scratch: Option<&Path>) -> Result<ExtractionTree, ArchiveError> {
    let display_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string());

    let kind = ArchiveKind::detect(archive)
        .ok_or_else(|| ArchiveError::UnsupportedExtension(display_name.clone()))?;

    let file = File::open(archive)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("dist-harvester-");
    let dir = match scratch {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };

    // Owned from here on: an early return drops the tree and removes the dir.
    let tree = ExtractionTree {
        root: dir.path().to_path_buf(),
        dir: Some(dir),
        kind,
        source: archive.to_path_buf(),
    };

    match kind {
        ArchiveKind::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| zip_error(&display_name, e))?;
            zip.extract(tree.path())
                .map_err(|e| zip_error(&display_name, e))?;
        }
        ArchiveKind::TarGz => {
            let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
            tar::Archive::new(decoder)
                .unpack(tree.path())
                .map_err(|e| extraction_error(&display_name, e))?;
        }
    }

    debug!(archive = %display_name, format = kind.name(), path = %tree.path().display(), "Extracted archive");
    Ok(tree)
}

/// Failures writing into scratch space stop the census; anything else the
/// decoder reports is blamed on the archive.
fn extraction_error(archive: &str, e: io::Error) -> ArchiveError {
    match e.kind() {
        ErrorKind::StorageFull | ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            ArchiveError::Io(e)
        }
        _ => ArchiveError::Malformed {
            archive: archive.to_string(),
            reason: e.to_string(),
        },
    }
}

fn zip_error(archive: &str, e: zip::result::ZipError) -> ArchiveError {
    match e {
        zip::result::ZipError::Io(e) => extraction_error(archive, e),
        other => ArchiveError::Malformed {
            archive: archive.to_string(),
            reason: other.to_string(),
        },
    }
}
