//! Artifact harvester: turns the build tool's dependency list into files in
//! the dependencies directory.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::executor::GraphOutput;
use crate::model::ResolvedArtifact;
use crate::traits::InspectError;

#[derive(Debug, Deserialize)]
struct DependencyListing {
    #[serde(default)]
    dependencies: Option<Vec<ListedDependency>>,
}

#[derive(Debug, Deserialize)]
struct ListedDependency {
    id: String,
    #[serde(default)]
    location: Option<PathBuf>,
}

/// Parses the dependency list and assigns each artifact its target path.
///
/// Targets keep the original file name. When two artifacts resolve to the
/// same file name the first one wins.
pub fn parse_graph(graph: &GraphOutput, target_dir: &Path) -> Result<Vec<ResolvedArtifact>, InspectError> {
    let listing: DependencyListing = serde_yaml::from_str(&graph.text).map_err(|e| {
        InspectError::build_failure(format!("unreadable dependency list: {e}"))
    })?;

    let mut seen = HashSet::new();
    let mut artifacts = Vec::new();
    for dep in listing.dependencies.unwrap_or_default() {
        let Some(location) = dep.location else {
            debug!(id = %dep.id, "Skipping dependency without a resolved file");
            continue;
        };
        let Some(file_name) = location.file_name() else {
            return Err(InspectError::build_failure(format!(
                "dependency {} resolved to '{}', which is not a file",
                dep.id,
                location.display()
            )));
        };
        let target = target_dir.join(file_name);
        if !seen.insert(target.clone()) {
            warn!(id = %dep.id, target = %target.display(), "Duplicate artifact file name, keeping the first");
            continue;
        }
        artifacts.push(ResolvedArtifact {
            id: dep.id,
            location,
            target,
        });
    }
    Ok(artifacts)
}

/// Copies every resolved artifact into `target_dir` and returns the target
/// paths in dependency-list order.
///
/// # Errors
///
/// The first failed copy aborts with [`InspectError::ArtifactCopyError`].
/// Files copied before the failure stay where they are.
pub fn harvest(graph: &GraphOutput, target_dir: &Path) -> Result<Vec<String>, InspectError> {
    harvest_until(graph, target_dir, &AtomicBool::new(false))
}

/// Like [`harvest`], but stops before the next copy once `cancelled` is set.
///
/// A copy already in progress is not interrupted.
pub fn harvest_until(
    graph: &GraphOutput,
    target_dir: &Path,
    cancelled: &AtomicBool,
) -> Result<Vec<String>, InspectError> {
    let artifacts = parse_graph(graph, target_dir)?;
    let mut copied = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        if cancelled.load(Ordering::SeqCst) {
            warn!(copied = copied.len(), "Harvest cancelled");
            return Err(InspectError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "harvest cancelled",
            )));
        }
        std::fs::copy(&artifact.location, &artifact.target).map_err(|io| {
            InspectError::ArtifactCopyError {
                source_path: artifact.location.clone(),
                target_path: artifact.target.clone(),
                io,
            }
        })?;
        debug!(id = %artifact.id, target = %artifact.target.display(), "Copied artifact");
        copied.push(artifact.target.display().to_string());
    }

    info!(count = copied.len(), dir = %target_dir.display(), "Harvested artifacts");
    Ok(copied)
}
