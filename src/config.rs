//! Inspector configuration and wiring of the default collaborators.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{CatalogProvider, FileCatalogBuilder, ResolvingCatalogBuilder, RuntimeProvider, RuntimeSpec};
use crate::executor::BuildInvoker;
use crate::maven::MavenBuildTool;
use crate::traits::CatalogBuilder;

pub const DEFAULT_RUNTIME_VERSION: &str = "1.15.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Directory created next to the invocation when none is given.
pub const DEFAULT_DEPENDENCIES_DIRECTORY: &str = "dependencies";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InspectorConfig {
    pub runtime: RuntimeSpec,

    /// Maven executable; looked up on `PATH` when unset
    pub maven_executable: Option<PathBuf>,

    pub maven_settings: Option<PathBuf>,

    /// Local repository override passed as `-Dmaven.repo.local`
    pub local_repository: Option<PathBuf>,

    /// Pre-generated catalog document. When unset the catalog is generated
    /// with the build tool.
    pub catalog_file: Option<PathBuf>,

    /// Parent directory for build workspaces (system temp dir when unset)
    pub workspace_root: Option<PathBuf>,

    /// Build and per-stage timeout in seconds
    pub timeout_secs: u64,

    /// Maximum builds running at once
    pub concurrency_limit: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeSpec {
                provider: RuntimeProvider::Main,
                version: DEFAULT_RUNTIME_VERSION.to_string(),
            },
            maven_executable: None,
            maven_settings: None,
            local_repository: None,
            catalog_file: None,
            workspace_root: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency_limit: 1,
        }
    }
}

impl InspectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Maven-backed invoker configured from this config.
    pub fn build_invoker(&self) -> BuildInvoker {
        let tool = MavenBuildTool::locate(self.maven_executable.clone());
        BuildInvoker::new(Arc::new(tool))
            .with_timeout(self.timeout())
            .with_concurrency_limit(self.concurrency_limit)
            .with_local_repository(self.local_repository.clone())
            .with_settings(self.maven_settings.clone())
            .with_workspace_root(self.workspace_root.clone())
    }

    /// Catalog provider reading `catalog_file`, or generating through `invoker`.
    pub fn catalog_provider(&self, invoker: Arc<BuildInvoker>) -> CatalogProvider {
        let builder: Arc<dyn CatalogBuilder> = match &self.catalog_file {
            Some(path) => Arc::new(FileCatalogBuilder::new(path)),
            None => Arc::new(ResolvingCatalogBuilder::new(invoker)),
        };
        CatalogProvider::new(self.runtime.clone(), builder)
    }
}
