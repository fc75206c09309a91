pub mod catalog;
pub mod census;
pub mod config;
pub mod executor;
pub mod fetch;
pub mod model;
pub mod traits;

// Re-export common types for convenience
pub use catalog::*;
pub use config::*;
pub use executor::*;
pub use model::*;
pub use traits::*;
