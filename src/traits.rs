use crate::model::Package;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Catalog task failed: {0}")]
    Join(String),
}

/// Source of the ranked package list fed to the fetch phase.
#[async_trait]
pub trait PackageCatalog: Send + Sync {
    /// Returns up to `limit` packages that ship binary wheels, most downloaded first.
    async fn top_binary_packages(&self, limit: usize) -> Result<Vec<Package>, CatalogError>;
}
