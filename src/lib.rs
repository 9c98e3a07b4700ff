pub mod catalog;
pub mod cli;
pub mod config;
pub mod executor;
pub mod harvest;
pub mod maven;
pub mod model;
pub mod output;
pub mod project;
pub mod scanner;
pub mod traits;

// Re-export common types for convenience
pub use catalog::{Catalog, CatalogProvider, RuntimeProvider, RuntimeSpec};
pub use config::InspectorConfig;
pub use executor::*;
pub use model::*;
pub use project::Project;
pub use traits::*;
