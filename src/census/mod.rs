//! Census module - native artifact inventory of fetched distributions.
//!
//! - **Archive**: scoped extraction via [`ExtractionTree`]
//! - **Scan**: filename matching against compiled-artifact suffixes
//! - **Collector**: per-pass dedup of `(package, artifact)` keys
//! - **Pipeline**: sequential driver via [`CensusPipeline`]

pub mod archive;
pub mod collector;
pub mod pipeline;
pub mod scan;

pub use archive::{ArchiveError, ArchiveKind, ExtractionTree};
pub use collector::CensusCollector;
pub use pipeline::{CensusError, CensusPipeline, CensusReport};
pub use scan::{is_binary_artifact, ARTIFACT_PATTERN};
