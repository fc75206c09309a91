//! Package catalogs: the pre-populated SQLite download ranking, and a fixed list.

use crate::model::Package;
use crate::traits::{CatalogError, PackageCatalog};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::PathBuf;
use tracing::{debug, instrument};

const TOP_BINARY_PACKAGES: &str =
    "SELECT name FROM packages WHERE has_binary_wheel ORDER BY downloads DESC LIMIT ?1";

/// Read-only view over a `packages(name, downloads, has_binary_wheel)` table.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
}

impl SqliteCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn query(&self, limit: usize) -> Result<Vec<Package>, CatalogError> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(TOP_BINARY_PACKAGES)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let packages = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))?
            .map(|name| name.map(Package::new))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(packages)
    }
}

#[async_trait]
impl PackageCatalog for SqliteCatalog {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn top_binary_packages(&self, limit: usize) -> Result<Vec<Package>, CatalogError> {
        let catalog = self.clone();
        let packages = tokio::task::spawn_blocking(move || catalog.query(limit))
            .await
            .map_err(|e| CatalogError::Join(e.to_string()))??;
        debug!(count = packages.len(), "Loaded packages from catalog");
        Ok(packages)
    }
}

/// A fixed, already-ranked package list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    packages: Vec<Package>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            packages: names.into_iter().map(Package::new).collect(),
        }
    }
}

#[async_trait]
impl PackageCatalog for StaticCatalog {
    async fn top_binary_packages(&self, limit: usize) -> Result<Vec<Package>, CatalogError> {
        Ok(self.packages.iter().take(limit).cloned().collect())
    }
}
