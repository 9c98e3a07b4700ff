//! Harvest module - transitive resolution and the inspection pipeline.
//!
//! - **Artifacts**: dependency list parsing and copying via [`artifacts::harvest`]
//! - **Pipeline**: the run coordinator [`pipeline::InspectPipeline`]

pub mod artifacts;
pub mod pipeline;

pub use artifacts::{harvest, harvest_until, parse_graph};

pub use pipeline::{
    InspectMode, InspectPipeline, InspectReport, InspectRequest, InspectState, InspectStats,
};
